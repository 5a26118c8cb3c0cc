use std::str::FromStr;

/// A validated daily trigger time in 24-hour `HH:MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTime {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeFormatError {
    #[error("Time string cannot be empty")]
    Empty,
    #[error("Time must be in HH:MM format (e.g., 09:30, 18:00)")]
    Format,
    #[error("Hours must be between 00 and 23, got {0}")]
    HourOutOfRange(String),
    #[error("Minutes must be between 00 and 59, got {0}")]
    MinuteOutOfRange(String),
}

/// Accepts only two digits, a colon and two digits, with hour 00-23 and minute 00-59.
pub fn validate_time(s: &str) -> Result<ScheduleTime, TimeFormatError> {
    if s.is_empty() {
        return Err(TimeFormatError::Empty);
    }
    let Some((hours, minutes)) = s.split_once(':') else {
        return Err(TimeFormatError::Format);
    };
    let two_digits = |p: &str| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(TimeFormatError::Format);
    }

    let hour: u32 = hours.parse().map_err(|_| TimeFormatError::Format)?;
    let minute: u32 = minutes.parse().map_err(|_| TimeFormatError::Format)?;
    if hour > 23 {
        return Err(TimeFormatError::HourOutOfRange(hours.to_string()));
    }
    if minute > 59 {
        return Err(TimeFormatError::MinuteOutOfRange(minutes.to_string()));
    }
    Ok(ScheduleTime { hour, minute })
}

impl FromStr for ScheduleTime {
    type Err = TimeFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_time(s)
    }
}

impl std::fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
