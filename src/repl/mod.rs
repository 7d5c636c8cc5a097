//! The interactive line-oriented loop: read a line, parse it, execute
//! it, print the result.

mod console;

use std::io::{self, BufRead};

use tracing::error;

use crate::errors::Error;
use crate::sql::{self, Line, MetaCommand, Statement};
use crate::storage::btree;
use crate::storage::Table;

/// Runs the loop to completion. Returns `Ok(())` on `.exit` or EOF,
/// `Err` only for a fatal engine error (the caller should exit nonzero).
pub fn run(table: &mut Table) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        console::print_prompt()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        match sql::parse_line(&line) {
            Ok(Line::Meta(MetaCommand::Exit)) => {
                table.close()?;
                break;
            }
            Ok(Line::Meta(MetaCommand::Constants)) => print_constants(),
            Ok(Line::Meta(MetaCommand::Unrecognized(cmd))) => {
                console::echo(format!("Unrecognized command '{cmd}'."));
            }
            Ok(Line::Statement(Statement::Insert(row))) => match table.insert(&row) {
                Ok(()) => console::echo("Executed."),
                Err(Error::Duplicate) => console::echo(Error::Duplicate.to_string()),
                Err(e) if e.is_fatal() => {
                    error!(%e, "fatal error during insert");
                    return Err(e);
                }
                Err(e) => console::echo(e.to_string()),
            },
            Ok(Line::Statement(Statement::Select)) => match table.select() {
                Ok(rows) => {
                    for row in rows {
                        console::echo(row.to_string());
                    }
                    console::echo("Executed.");
                }
                Err(e) if e.is_fatal() => {
                    error!(%e, "fatal error during select");
                    return Err(e);
                }
                Err(e) => console::echo(e.to_string()),
            },
            Err(e) => console::echo(e.to_string()),
        }
    }
    Ok(())
}

fn print_constants() {
    console::echo(format!("ROW_SIZE: {}", crate::storage::row::ROW_SIZE));
    console::echo(format!("COMMON_NODE_HEADER_SIZE: {}", btree::COMMON_NODE_HEADER_SIZE));
    console::echo(format!("LEAF_NODE_HEADER_SIZE: {}", btree::LEAF_NODE_HEADER_SIZE));
    console::echo(format!("LEAF_NODE_CELL_SIZE: {}", btree::LEAF_NODE_CELL_SIZE));
    console::echo(format!("LEAF_NODE_SPACE_FOR_CELLS: {}", btree::LEAF_NODE_SPACE_FOR_CELLS));
    console::echo(format!("LEAF_NODE_MAX_CELLS: {}", btree::LEAF_NODE_MAX_CELLS));
}
