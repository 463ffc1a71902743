//! Sample console driver for the Canopy index.
//!
//! Reads an insert script followed by an erase script from stdin: a count,
//! then that many integer keys, for each phase. Every new insertion and
//! every successful erase is followed by a structural dump of the tree;
//! between the phases the full sorted traversal is printed.

mod logger;

use std::io::{self, Read, Write};

use log::{debug, info, LevelFilter};

use canopy_common::{CanopyError, DriverConfig, Result};
use canopy_index::BPlusTreeSet;

fn main() -> Result<()> {
    let config = DriverConfig::from_env()?;
    logger::init(level_filter(&config.log_filter));
    info!("driver starting with order {}", config.order);

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let mut tokens = input.split_whitespace();

    run(&config, &mut tokens)
}

fn run<'a>(config: &DriverConfig, tokens: &mut impl Iterator<Item = &'a str>) -> Result<()> {
    let mut tree = BPlusTreeSet::new(config.order)?;
    let stdout = io::stdout();

    prompt("How many elements do you want to insert: ")?;
    let inserts = next_int(tokens)?;
    for _ in 0..inserts {
        let key = next_int(tokens)?;
        let (_, inserted) = tree.insert(key);
        if inserted {
            println!("After insert {key}:");
            print!("{}", tree.dump());
        } else {
            println!("Key {key} already exists");
        }
        println!();
    }
    debug!("insert phase done, {} keys", tree.len());

    let mut line = String::new();
    for key in &tree {
        line.push_str(&key.to_string());
        line.push(' ');
    }
    println!("{}", line.trim_end());
    println!();

    prompt("How many elements do you want to erase: ")?;
    let erases = next_int(tokens)?;
    for _ in 0..erases {
        let key = next_int(tokens)?;
        let cursor = tree.find(&key);
        if cursor.is_end() {
            println!("Key {key} doesn't exist");
            println!();
        } else {
            tree.erase(cursor)?;
            println!("After erase {key}");
            print!("{}", tree.dump());
            println!();
        }
    }
    debug!("erase phase done, {} keys", tree.len());

    stdout.lock().flush()?;
    Ok(())
}

fn prompt(text: &str) -> Result<()> {
    print!("{text}");
    io::stdout().flush()?;
    Ok(())
}

fn next_int<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<i64> {
    let token = tokens
        .next()
        .ok_or_else(|| CanopyError::Parse("unexpected end of input".to_string()))?;
    token
        .parse()
        .map_err(|_| CanopyError::Parse(format!("expected an integer, got {token:?}")))
}

fn level_filter(name: &str) -> LevelFilter {
    match name {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_int() {
        let mut tokens = "3 -7 x".split_whitespace();
        assert_eq!(next_int(&mut tokens).unwrap(), 3);
        assert_eq!(next_int(&mut tokens).unwrap(), -7);
        assert!(next_int(&mut tokens).is_err());
        assert!(next_int(&mut tokens).is_err());
    }

    #[test]
    fn test_level_filter_fallback() {
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter("anything"), LevelFilter::Info);
    }

    #[test]
    fn test_scripted_session() {
        let config = DriverConfig::default();
        let script = "3 5 1 5 2 1 9";
        let mut tokens = script.split_whitespace();
        // 3 inserts (5, 1, then duplicate 5), then 2 erases (1, missing 9).
        run(&config, &mut tokens).unwrap();
    }
}
