//! `.env` loading for local runs.
//!
//! Values already present in the process environment are never overwritten.

use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct LoadedEnvFile {
    pub path: PathBuf,
    /// Passed with `--env-file` rather than picked up from the working directory.
    pub explicit: bool,
}

/// Reads `--env-file <path>` (or `--env-file=<path>`) from the command line and
/// loads that file, falling back to `./.env` when present.
pub fn load_from_cli() -> Result<Option<LoadedEnvFile>, String> {
    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|a| a.into_string().map_err(|_| "argument contains invalid UTF-8".to_string()))
        .collect::<Result<_, _>>()?;

    match env_file_argument(&args)? {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("env file not found: {}", path.display()));
            }
            load(&path)?;
            Ok(Some(LoadedEnvFile { path, explicit: true }))
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let path = cwd.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            load(&path)?;
            Ok(Some(LoadedEnvFile { path, explicit: false }))
        }
    }
}

fn env_file_argument(args: &[String]) -> Result<Option<PathBuf>, String> {
    let mut found: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let value = if arg == "--" {
            break;
        } else if arg == "--env-file" {
            iter.next().cloned().unwrap_or_default()
        } else if let Some(v) = arg.strip_prefix("--env-file=") {
            v.to_string()
        } else {
            return Err(format!("unrecognised argument: {}", arg));
        };
        if value.is_empty() {
            return Err("`--env-file` requires a path argument".to_string());
        }
        if found.replace(PathBuf::from(value)).is_some() {
            return Err("`--env-file` provided more than once".to_string());
        }
    }
    Ok(found)
}

fn load(path: &Path) -> Result<(), String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    for (index, line) in text.lines().enumerate() {
        let parsed = parse_line(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        if let Some((key, value)) = parsed {
            if std::env::var_os(&key).is_none() {
                // Mutating the process environment is unsafe once threads exist;
                // this runs before the runtime starts.
                unsafe {
                    std::env::set_var(key, value);
                }
            }
        }
    }
    Ok(())
}

/// One `KEY=value` line. Blank lines and `#` comments yield `None`; an
/// `export ` prefix is accepted.
pub fn parse_line(line: &str) -> Result<Option<(String, String)>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

    let (key, raw) = line.split_once('=').ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();
    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.chars().any(char::is_whitespace) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    let raw = raw.trim();
    let value = if let Some(rest) = raw.strip_prefix('"') {
        parse_quoted(rest, '"', true)?
    } else if let Some(rest) = raw.strip_prefix('\'') {
        parse_quoted(rest, '\'', false)?
    } else {
        raw.split('#').next().unwrap_or_default().trim_end().to_string()
    };
    Ok(Some((key.to_string(), value)))
}

/// Reads up to the closing `quote`. Only a trailing comment may follow it.
/// Backslash escapes are honoured when `escapes` is set.
fn parse_quoted(input: &str, quote: char, escapes: bool) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if escapes && ch == '\\' {
            let escaped = chars
                .next()
                .ok_or_else(|| "unterminated escape sequence in quoted value".to_string())?;
            out.push(match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
        } else if ch == quote {
            let rest = chars.as_str().trim();
            if rest.is_empty() || rest.starts_with('#') {
                return Ok(out);
            }
            return Err("unexpected characters after closing quote".to_string());
        } else {
            out.push(ch);
        }
    }
    Err("unterminated quoted value".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> Option<(String, String)> {
        Some((k.to_string(), v.to_string()))
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   # BIND_ADDR=0.0.0.0:5001").unwrap(), None);
    }

    #[test]
    fn plain_values_drop_trailing_comments() {
        assert_eq!(parse_line("DB_POOL_SIZE=4 # small box").unwrap(), pair("DB_POOL_SIZE", "4"));
        assert_eq!(parse_line("export RUST_LOG=debug").unwrap(), pair("RUST_LOG", "debug"));
        assert_eq!(parse_line("OLLAMA_URL=").unwrap(), pair("OLLAMA_URL", ""));
    }

    #[test]
    fn double_quotes_support_escapes() {
        assert_eq!(
            parse_line(r#"DATABASE_URL="postgres://u:p#w@db/eco\n" # dev"#).unwrap(),
            pair("DATABASE_URL", "postgres://u:p#w@db/eco\n")
        );
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(parse_line(r"SANDBOX_INTERPRETER='C:\py\python'").unwrap(), pair("SANDBOX_INTERPRETER", r"C:\py\python"));
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(parse_line("JUST_A_NAME").is_err());
        assert!(parse_line("=value").is_err());
        assert!(parse_line("BAD KEY=1").is_err());
        assert!(parse_line("A=\"open").is_err());
        assert!(parse_line("A='x' trailing").is_err());
    }

    #[test]
    fn cli_accepts_one_env_file() {
        let args = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(env_file_argument(&args(&[])).unwrap(), None);
        assert_eq!(
            env_file_argument(&args(&["--env-file", "dev.env"])).unwrap(),
            Some(PathBuf::from("dev.env"))
        );
        assert_eq!(
            env_file_argument(&args(&["--env-file=prod.env"])).unwrap(),
            Some(PathBuf::from("prod.env"))
        );
        assert!(env_file_argument(&args(&["--env-file"])).is_err());
        assert!(env_file_argument(&args(&["--env-file=a", "--env-file=b"])).is_err());
        assert!(env_file_argument(&args(&["--port", "1"])).is_err());
    }
}
