use serde::Deserialize;
use uuid::Uuid;

/// Target of an assignment form: a record id, or the literal `"unassign"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Assignment(Option<Uuid>);

impl Assignment {
    pub fn target(&self) -> Option<Uuid> {
        self.0
    }
}

impl TryFrom<String> for Assignment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value == "unassign" {
            return Ok(Self(None));
        }
        Uuid::parse_str(value)
            .map(|id| Self(Some(id)))
            .map_err(|_| format!("{value} is neither a valid id nor \"unassign\"."))
    }
}
