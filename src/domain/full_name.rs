use unicode_segmentation::UnicodeSegmentation;

const MIN_LENGTH: usize = 2;
const MAX_LENGTH: usize = 120;

#[derive(Debug, Clone)]
pub struct FullName(String);

impl FullName {
    pub fn parse(s: &str) -> Result<FullName, String> {
        let s = s.trim();
        let len = s.graphemes(true).count();
        if len < MIN_LENGTH {
            return Err("Enter the team member's full name.".into());
        }
        if len > MAX_LENGTH {
            return Err(format!(
                "Full name must be {} characters or fewer.",
                MAX_LENGTH
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for FullName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
