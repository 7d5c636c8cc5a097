use super::{MetaCommand, Statement};
use crate::errors::Error;
use crate::storage::row::{COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE};
use crate::storage::Row;

/// A parsed line of input: either a dot-command or a statement ready to
/// hand to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Meta(MetaCommand),
    Statement(Statement),
}

/// Parses one line of REPL input. A leading `.` is a meta-command; the
/// rest are statements. Unknown statement keywords and malformed
/// `insert` arity/lengths come back as `Error::Syntax`/`Error::TooLong`.
pub fn parse_line(line: &str) -> Result<Line, Error> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix('.') {
        return Ok(Line::Meta(parse_meta_command(rest)));
    }

    if line == "select" {
        return Ok(Line::Statement(Statement::Select));
    }

    if let Some(rest) = strip_keyword(line, "insert") {
        return Ok(Line::Statement(Statement::Insert(parse_insert_args(rest)?)));
    }

    Err(Error::Syntax(format!("Unrecognized keyword at start of '{line}'.")))
}

fn parse_meta_command(rest: &str) -> MetaCommand {
    match rest {
        "exit" => MetaCommand::Exit,
        "constants" => MetaCommand::Constants,
        other => MetaCommand::Unrecognized(format!(".{other}")),
    }
}

/// Strips `keyword` followed by whitespace. Returns `None` if `line`
/// doesn't start with that exact (case-sensitive) keyword.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix(' ')
}

fn parse_insert_args(rest: &str) -> Result<Row, Error> {
    let mut fields = rest.split_whitespace();
    let id_str = fields
        .next()
        .ok_or_else(|| Error::Syntax("Syntax error. Could not parse statement.".to_string()))?;
    let username = fields
        .next()
        .ok_or_else(|| Error::Syntax("Syntax error. Could not parse statement.".to_string()))?;
    let email = fields
        .next()
        .ok_or_else(|| Error::Syntax("Syntax error. Could not parse statement.".to_string()))?;
    if fields.next().is_some() {
        return Err(Error::Syntax("Syntax error. Could not parse statement.".to_string()));
    }

    let id: i64 = id_str
        .parse()
        .map_err(|_| Error::Syntax("Syntax error. Could not parse statement.".to_string()))?;
    if id < 0 {
        return Err(Error::Syntax("ID must be positive.".to_string()));
    }
    let id = u32::try_from(id).map_err(|_| Error::Syntax("ID must be positive.".to_string()))?;

    if username.len() > COLUMN_USERNAME_SIZE {
        return Err(Error::TooLong("username".to_string()));
    }
    if email.len() > COLUMN_EMAIL_SIZE {
        return Err(Error::TooLong("email".to_string()));
    }

    Ok(Row::new(id, username, email))
}
