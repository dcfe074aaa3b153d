use std::sync::OnceLock;

use anyhow::bail;
use regex::Regex;

use crate::error::Error;

pub struct SqlUtil {}

const MSSQL_ESCAPE_PAIR: (char, char) = ('[', ']');
const MAX_IDENTIFIER_LEN: usize = 128;

static IDENTIFIER_RE: OnceLock<Option<Regex>> = OnceLock::new();

// T-SQL reserved keywords, identifiers matching one of these must be delimited
const RESERVED_WORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUTHORIZATION", "BACKUP", "BEGIN", "BETWEEN",
    "BREAK", "BROWSE", "BULK", "BY", "CASCADE", "CASE", "CHECK", "CHECKPOINT", "CLOSE", "CLUSTERED",
    "COALESCE", "COLLATE", "COLUMN", "COMMIT", "COMPUTE", "CONSTRAINT", "CONTAINS", "CONTAINSTABLE",
    "CONTINUE", "CONVERT", "CREATE", "CROSS", "CURRENT", "CURRENT_DATE", "CURRENT_TIME",
    "CURRENT_TIMESTAMP", "CURRENT_USER", "CURSOR", "DATABASE", "DBCC", "DEALLOCATE", "DECLARE",
    "DEFAULT", "DELETE", "DENY", "DESC", "DISK", "DISTINCT", "DISTRIBUTED", "DOUBLE", "DROP",
    "DUMP", "ELSE", "END", "ERRLVL", "ESCAPE", "EXCEPT", "EXEC", "EXECUTE", "EXISTS", "EXIT",
    "EXTERNAL", "FETCH", "FILE", "FILLFACTOR", "FOR", "FOREIGN", "FREETEXT", "FREETEXTTABLE",
    "FROM", "FULL", "FUNCTION", "GOTO", "GRANT", "GROUP", "HAVING", "HOLDLOCK", "IDENTITY",
    "IDENTITY_INSERT", "IDENTITYCOL", "IF", "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "INTO",
    "IS", "JOIN", "KEY", "KILL", "LEFT", "LIKE", "LINENO", "LOAD", "MERGE", "NATIONAL", "NOCHECK",
    "NONCLUSTERED", "NOT", "NULL", "NULLIF", "OF", "OFF", "OFFSETS", "ON", "OPEN", "OPENDATASOURCE",
    "OPENQUERY", "OPENROWSET", "OPENXML", "OPTION", "OR", "ORDER", "OUTER", "OVER", "PERCENT",
    "PIVOT", "PLAN", "PRECISION", "PRIMARY", "PRINT", "PROC", "PROCEDURE", "PUBLIC", "RAISERROR",
    "READ", "READTEXT", "RECONFIGURE", "REFERENCES", "REPLICATION", "RESTORE", "RESTRICT", "RETURN",
    "REVERT", "REVOKE", "RIGHT", "ROLLBACK", "ROWCOUNT", "ROWGUIDCOL", "RULE", "SAVE", "SCHEMA",
    "SECURITYAUDIT", "SELECT", "SEMANTICKEYPHRASETABLE", "SEMANTICSIMILARITYDETAILSTABLE",
    "SEMANTICSIMILARITYTABLE", "SESSION_USER", "SET", "SETUSER", "SHUTDOWN", "SOME", "STATISTICS",
    "SYSTEM_USER", "TABLE", "TABLESAMPLE", "TEXTSIZE", "THEN", "TO", "TOP", "TRAN", "TRANSACTION",
    "TRIGGER", "TRUNCATE", "TRY_CONVERT", "TSEQUAL", "UNION", "UNIQUE", "UNPIVOT", "UPDATE",
    "UPDATETEXT", "USE", "USER", "VALUES", "VARYING", "VIEW", "WAITFOR", "WHEN", "WHERE", "WHILE",
    "WITH", "WITHIN", "WRITETEXT",
];

impl SqlUtil {
    pub fn is_escaped(token: &str, escape_pair: &(char, char)) -> bool {
        token.len() >= 2 && token.starts_with(escape_pair.0) && token.ends_with(escape_pair.1)
    }

    pub fn escape(token: &str, escape_pair: &(char, char)) -> String {
        if !Self::is_escaped(token, escape_pair) {
            return format!(r#"{}{}{}"#, escape_pair.0, token, escape_pair.1);
        }
        token.to_string()
    }

    pub fn unescape(token: &str, escape_pair: &(char, char)) -> String {
        if !Self::is_escaped(token, escape_pair) {
            return token.to_string();
        }
        token[1..token.len() - 1].to_string()
    }

    pub fn is_reserved_word(token: &str) -> bool {
        RESERVED_WORDS
            .iter()
            .any(|word| word.eq_ignore_ascii_case(token))
    }

    /// Letters, digits, `_`, `@`, `#`, `$`, not starting with a digit or `$`.
    pub fn is_regular_identifier(token: &str) -> bool {
        let re = IDENTIFIER_RE.get_or_init(|| {
            let pattern = format!(
                r"^[a-zA-Z_@#][a-zA-Z0-9_@#$]{{0,{}}}$",
                MAX_IDENTIFIER_LEN - 1
            );
            Regex::new(&pattern).ok()
        });
        re.as_ref().map_or(false, |re| re.is_match(token))
    }

    /// Single entry point for every schema, table, type and column name written into sql text.
    /// Names are validated against the allow-list, reserved words are delimited with `[]`.
    pub fn format_identifier(token: &str) -> anyhow::Result<String> {
        let name = Self::unescape(token, &MSSQL_ESCAPE_PAIR);
        // `@` and `#` prefixes denote variables and temp objects
        if !Self::is_regular_identifier(&name) || name.starts_with('@') || name.starts_with('#') {
            bail! {Error::InvalidIdentifier(format!(
                "`{}` is not an allowed sql identifier",
                token
            ))}
        }

        if Self::is_reserved_word(&name) {
            return Ok(Self::escape(&name, &MSSQL_ESCAPE_PAIR));
        }
        Ok(name)
    }

    /// schema.tb
    pub fn format_qualified(schema: &str, tb: &str) -> anyhow::Result<String> {
        Ok(format!(
            "{}.{}",
            Self::format_identifier(schema)?,
            Self::format_identifier(tb)?
        ))
    }
}
