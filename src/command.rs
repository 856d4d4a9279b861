//! RouterOS command synthesis.
//!
//! Commands are plain console lines: a menu path followed by `key=value`
//! arguments. The remote protocol has no parameter binding, so values are
//! cleaned with [`sanitize`] before they reach [`format`]. [`CommandBuilder`]
//! does that for every text value it is given.
//!
//! [`sanitize`] is a denylist: it deletes the listed metacharacters and does
//! nothing about exotic encodings or nested quoting. Values that pass through
//! [`CommandBuilder`] additionally lose `"` and have CR/LF folded into spaces,
//! so one value can never span more than one console line.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static METACHARACTERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[;&|`$(){}\[\]\\]").unwrap());

/// Menu paths used by the dispatcher.
pub mod paths {
    pub const IDENTITY_PRINT: &str = "/system/identity/print";
    pub const RESOURCE_PRINT: &str = "/system/resource/print";
    pub const ROUTEROS_PACKAGE_PRINT: &str = "/system/package/print where name=routeros";
    pub const ADDRESS_LIST: &str = "/ip/firewall/address-list";
    pub const FIREWALL_FILTER: &str = "/ip/firewall/filter";
}

/// A command argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Text(String),
    Int(i64),
    Bool(bool),
    /// Explicitly empty value, rendered as `key=""`.
    Clear,
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Text(s) if s.chars().any(char::is_whitespace) => write!(f, "\"{s}\""),
            ArgValue::Text(s) => f.write_str(s),
            ArgValue::Int(n) => write!(f, "{n}"),
            ArgValue::Bool(true) => f.write_str("yes"),
            ArgValue::Bool(false) => f.write_str("no"),
            ArgValue::Clear => f.write_str("\"\""),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Text(value)
    }
}

impl From<&String> for ArgValue {
    fn from(value: &String) -> Self {
        ArgValue::Text(value.clone())
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Int(value)
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Int(value.into())
    }
}

impl From<u16> for ArgValue {
    fn from(value: u16) -> Self {
        ArgValue::Int(value.into())
    }
}

/// Removes shell/command metacharacters from a value.
pub fn sanitize(value: impl fmt::Display) -> String {
    METACHARACTERS
        .replace_all(&value.to_string(), "")
        .into_owned()
}

/// Renders `key=value` arguments joined by single spaces, in the given order.
///
/// Entries with no value or an empty text value are omitted. Values are not
/// sanitized here.
pub fn format<K: AsRef<str>>(fields: &[(K, Option<ArgValue>)]) -> String {
    fields
        .iter()
        .filter_map(|(key, value)| match value {
            None => None,
            Some(ArgValue::Text(s)) if s.is_empty() => None,
            Some(value) => Some(format!("{}={}", key.as_ref(), value)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders a `where` clause matching every pair, values always quoted.
pub fn where_clause(conditions: &[(&str, &str)]) -> String {
    let terms = conditions
        .iter()
        .map(|(key, value)| format!("{key}=\"{}\"", clean(value)))
        .collect::<Vec<_>>();
    format!("where {}", terms.join(" and "))
}

/// Renders a `where` clause matching one item identifier such as `*1A`.
pub fn where_id(id: &str) -> String {
    format!("where .id={}", clean(id))
}

/// Sanitized single-line value that also cannot terminate a quoted string.
fn clean(value: &str) -> String {
    sanitize(value)
        .replace('"', "")
        .replace(['\r', '\n'], " ")
}

/// Ordered builder for one RouterOS command line.
///
/// Text values are sanitized on insertion.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    path: String,
    item: Option<String>,
    args: Vec<(String, Option<ArgValue>)>,
}

impl CommandBuilder {
    /// Starts a command for a menu path such as `/ip/firewall/filter/add`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            item: None,
            args: Vec::new(),
        }
    }

    /// Addresses a single item, e.g. the `*1A` in `set *1A comment=x`.
    pub fn item(mut self, id: &str) -> Self {
        self.item = Some(clean(id));
        self
    }

    /// Appends an argument.
    pub fn arg(self, key: &str, value: impl Into<ArgValue>) -> Self {
        self.opt(key, Some(value))
    }

    /// Appends an argument that is skipped when `value` is `None`.
    pub fn opt<V: Into<ArgValue>>(mut self, key: &str, value: Option<V>) -> Self {
        let value = value.map(|v| match v.into() {
            ArgValue::Text(s) => ArgValue::Text(clean(&s)),
            other => other,
        });
        self.args.push((key.to_string(), value));
        self
    }

    /// Appends an update: `None` leaves the field alone, an empty string
    /// clears it on the device.
    pub fn assign(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some("") => self.opt(key, Some(ArgValue::Clear)),
            other => self.opt(key, other),
        }
    }

    /// Renders the command line.
    pub fn build(&self) -> String {
        let mut line = self.path.clone();
        if let Some(item) = &self.item {
            line.push(' ');
            line.push_str(item);
        }
        let args = format(&self.args);
        if !args.is_empty() {
            line.push(' ');
            line.push_str(&args);
        }
        line
    }
}

impl fmt::Display for CommandBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_omits_absent_values_and_keeps_order() {
        let fields = [
            ("list", Some(ArgValue::from("foo"))),
            ("address", Some(ArgValue::from("1.2.3.4"))),
            ("comment", Some(ArgValue::from("has space"))),
            ("disabled", Some(ArgValue::from(true))),
            ("timeout", None),
        ];
        assert_eq!(
            format(&fields),
            r#"list=foo address=1.2.3.4 comment="has space" disabled=yes"#
        );
    }

    #[test]
    fn format_skips_empty_strings_and_renders_scalars() {
        let fields = [
            ("comment", Some(ArgValue::from(""))),
            ("disabled", Some(ArgValue::from(false))),
            ("place-before", Some(ArgValue::from(3u32))),
        ];
        assert_eq!(format(&fields), "disabled=no place-before=3");
    }

    #[test]
    fn format_quotes_any_whitespace() {
        let fields = [("comment", Some(ArgValue::from("tab\there")))];
        assert_eq!(format(&fields), "comment=\"tab\there\"");
    }

    #[test]
    fn clear_renders_empty_quotes() {
        let fields = [("comment", Some(ArgValue::Clear))];
        assert_eq!(format(&fields), r#"comment="""#);
    }

    #[test]
    fn sanitize_strips_metacharacters() {
        assert_eq!(sanitize("a;b|c$(d)"), "abcd");
        assert_eq!(sanitize("x&y`z{w}[v]\\u"), "xyzwvu");
        assert_eq!(sanitize(42), "42");
        assert_eq!(sanitize("10.0.0.0/24"), "10.0.0.0/24");
    }

    #[test]
    fn builder_sanitizes_text_values() {
        let cmd = CommandBuilder::new("/ip/firewall/address-list/add")
            .arg("list", "evil;/system/reboot")
            .arg("address", "1.2.3.4")
            .opt::<&str>("timeout", None)
            .build();
        assert_eq!(
            cmd,
            "/ip/firewall/address-list/add list=evil/system/reboot address=1.2.3.4"
        );
    }

    #[test]
    fn builder_drops_embedded_quotes() {
        let cmd = CommandBuilder::new("/ip/firewall/filter/add")
            .arg("comment", "x\" disabled=\"yes")
            .build();
        assert_eq!(cmd, r#"/ip/firewall/filter/add comment="x disabled=yes""#);
    }

    #[test]
    fn builder_folds_line_breaks_into_one_line() {
        let cmd = CommandBuilder::new("/ip/firewall/address-list/add")
            .arg("list", "blocked")
            .arg("comment", "first\r\n/system/reboot")
            .build();
        assert_eq!(
            cmd,
            r#"/ip/firewall/address-list/add list=blocked comment="first  /system/reboot""#
        );
        assert!(!cmd.contains('\n'));
        assert_eq!(where_id("*1\n/system/reboot"), "where .id=*1 /system/reboot");
    }

    #[test]
    fn builder_set_addresses_item_and_clears_fields() {
        let cmd = CommandBuilder::new("/ip/firewall/address-list/set")
            .item("*1A")
            .assign("list", None)
            .assign("comment", Some(""))
            .assign("timeout", Some("1d"))
            .build();
        assert_eq!(
            cmd,
            r#"/ip/firewall/address-list/set *1A comment="" timeout=1d"#
        );
    }

    #[test]
    fn builder_without_args_is_bare_path() {
        assert_eq!(
            CommandBuilder::new(paths::IDENTITY_PRINT).to_string(),
            "/system/identity/print"
        );
    }

    #[test]
    fn where_id_is_unquoted() {
        assert_eq!(where_id("*1A"), "where .id=*1A");
        assert_eq!(where_id("*1;/system/reboot"), "where .id=*1/system/reboot");
    }

    #[test]
    fn where_clause_quotes_and_sanitizes() {
        assert_eq!(
            where_clause(&[("list", "blocked"), ("address", "1.2.3.4\" or \"1")]),
            r#"where list="blocked" and address="1.2.3.4 or 1""#
        );
    }
}
