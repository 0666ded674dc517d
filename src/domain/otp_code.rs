pub const OTP_LENGTH: usize = 6;

/// A code typed in by the user on the second login step.
#[derive(Debug, Clone)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(s: &str) -> Result<OtpCode, String> {
        let s = s.trim();
        if s.chars().count() != OTP_LENGTH {
            return Err("OTP must be 6 digits".into());
        }
        if !s.chars().all(|c| c.is_ascii_digit()) {
            return Err("OTP must be numeric".into());
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for OtpCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
