//! Prefixed ULID identifiers: `ses_01hq...` for chat sessions and
//! `cal_01hq...` for tool calls the provider left unnamed.

use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Session,
    Call,
}

impl IdPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Session => "ses",
            IdPrefix::Call => "cal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ses" => Some(IdPrefix::Session),
            "cal" => Some(IdPrefix::Call),
            _ => None,
        }
    }
}

pub struct Identifier;

impl Identifier {
    /// New identifier that sorts after every earlier one.
    pub fn ascending(prefix: IdPrefix) -> String {
        Self::format(prefix, Ulid::new())
    }

    /// New identifier that sorts before every earlier one, so a plain
    /// directory listing of saved sessions shows the newest first.
    pub fn descending(prefix: IdPrefix) -> String {
        Self::format(prefix, Ulid(!Ulid::new().0))
    }

    pub fn format(prefix: IdPrefix, ulid: Ulid) -> String {
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Split an identifier into prefix and ULID.
    pub fn parse(id: &str) -> Option<(IdPrefix, Ulid)> {
        let (prefix, rest) = id.split_once('_')?;
        Some((IdPrefix::parse(prefix)?, Ulid::from_string(rest).ok()?))
    }

    pub fn session() -> String {
        Self::descending(IdPrefix::Session)
    }

    pub fn call() -> String {
        Self::ascending(IdPrefix::Call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_ids_sort_newest_first() {
        let older = Identifier::session();
        std::thread::sleep(Duration::from_millis(2));
        let newer = Identifier::session();
        assert!(newer < older);
        assert!(newer.starts_with("ses_"));
        assert_eq!(newer.len(), 30);
    }

    #[test]
    fn test_call_ids_sort_oldest_first() {
        let first = Identifier::call();
        std::thread::sleep(Duration::from_millis(2));
        let second = Identifier::call();
        assert!(first < second);
        assert!(first.starts_with("cal_"));
    }

    #[test]
    fn test_parse() {
        let ulid = Ulid::new();
        let id = Identifier::format(IdPrefix::Call, ulid);
        assert_eq!(Identifier::parse(&id), Some((IdPrefix::Call, ulid)));

        assert!(Identifier::parse("nounderscore").is_none());
        assert!(Identifier::parse("msg_01HQXYZ").is_none());
        assert!(Identifier::parse("ses_notaulid").is_none());
    }
}
