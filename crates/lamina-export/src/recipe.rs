//! Parser and replayer for native lamina scripts.
//!
//! ```text
//! import lamina
//! load "photo.png"
//! grayscale
//! blur kernel_size=5
//! edge_detect low=100 high=200
//! save "edited_output.png"
//! ```
//!
//! One statement per line. Blank lines and lines starting with `#` are
//! ignored. Parameters are parsed literally and then normalized with
//! [`validate`](lamina_pipeline::validate), exactly like a spec coming
//! from the UI.

use std::str::FromStr;

use lamina_pipeline::filter::{FilterKind, FilterSpec};
use lamina_pipeline::{Image, ImageOps, OpsError};

/// A parsed native script.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    /// Path from the `load` line.
    pub source: String,
    /// Filters in application order, already validated.
    pub steps: Vec<FilterSpec>,
    /// Path from the `save` line.
    pub output: String,
}

/// Why a script failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptErrorKind {
    /// The first statement is not `import lamina`.
    #[error("expected `import lamina`")]
    MissingImport,

    /// `import` names something other than lamina.
    #[error("cannot import {0:?}, only `lamina` is supported")]
    UnknownModule(String),

    /// No `load` statement follows the import.
    #[error("expected `load \"<path>\"`")]
    MissingLoad,

    /// The script ends without a `save` statement.
    #[error("script has no `save \"<path>\"` statement")]
    MissingSave,

    /// A statement names no known filter.
    #[error("unknown filter {0:?}")]
    UnknownFilter(String),

    /// A required parameter is absent.
    #[error("{filter} needs a `{name}=` parameter")]
    MissingParameter {
        /// Filter being parsed.
        filter: FilterKind,
        /// Absent parameter.
        name: &'static str,
    },

    /// A parameter value is not a number of the right type.
    #[error("invalid value {value:?} for `{name}`")]
    BadParameter {
        /// Parameter name.
        name: String,
        /// Offending text.
        value: String,
    },

    /// A parameter the filter does not take, or a token that is not
    /// `name=value`.
    #[error("unexpected parameter {0:?}")]
    UnexpectedParameter(String),

    /// `edge_detect` thresholds are not in the fixed 1:2 ratio.
    #[error("edge_detect high threshold must be twice low (low={low}, high={high})")]
    ThresholdRatio {
        /// Low threshold as written.
        low: i32,
        /// High threshold as written.
        high: i32,
    },

    /// A string literal has no closing quote.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// A string literal contains an escape other than `\\`, `\"` or `\n`.
    #[error("invalid escape `\\{0}`")]
    InvalidEscape(char),

    /// Extra text after a complete statement, or statements after `save`.
    #[error("unexpected {0:?}")]
    TrailingContent(String),
}

/// A parse failure and the 1-based line it happened on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct ScriptError {
    /// 1-based line number. For [`ScriptErrorKind::MissingSave`] this is
    /// one past the last line.
    pub line: usize,
    /// What went wrong.
    pub kind: ScriptErrorKind,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Expect {
    Import,
    Load,
    Steps,
    End,
}

impl Recipe {
    /// Parse native script text.
    ///
    /// # Errors
    ///
    /// Returns a [`ScriptError`] for the first malformed line.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut expect = Expect::Import;
        let mut source = String::new();
        let mut output = String::new();
        let mut steps = Vec::new();
        let mut last_line = 0;

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            last_line = line;
            let stmt = raw.trim();
            if stmt.is_empty() || stmt.starts_with('#') {
                continue;
            }
            let fail = |kind| ScriptError { line, kind };
            let (word, rest) = stmt
                .split_once(char::is_whitespace)
                .map_or((stmt, ""), |(w, r)| (w, r.trim_start()));

            match expect {
                Expect::Import => {
                    if word != "import" {
                        return Err(fail(ScriptErrorKind::MissingImport));
                    }
                    if rest != "lamina" {
                        return Err(fail(ScriptErrorKind::UnknownModule(rest.to_owned())));
                    }
                    expect = Expect::Load;
                }
                Expect::Load => {
                    if word != "load" {
                        return Err(fail(ScriptErrorKind::MissingLoad));
                    }
                    source = parse_path(rest).map_err(fail)?;
                    expect = Expect::Steps;
                }
                Expect::Steps if word == "save" => {
                    output = parse_path(rest).map_err(fail)?;
                    expect = Expect::End;
                }
                Expect::Steps => steps.push(parse_step(word, rest).map_err(fail)?),
                Expect::End => {
                    return Err(fail(ScriptErrorKind::TrailingContent(stmt.to_owned())));
                }
            }
        }

        let missing = match expect {
            Expect::End => None,
            Expect::Import => Some(ScriptErrorKind::MissingImport),
            Expect::Load => Some(ScriptErrorKind::MissingLoad),
            Expect::Steps => Some(ScriptErrorKind::MissingSave),
        };
        if let Some(kind) = missing {
            return Err(ScriptError {
                line: last_line + 1,
                kind,
            });
        }

        Ok(Self {
            source,
            steps,
            output,
        })
    }

    /// Replay the steps on `image` through `ops`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the backend.
    pub fn run<O: ImageOps>(&self, ops: &O, image: &Image) -> Result<Image, OpsError> {
        tracing::debug!(steps = self.steps.len(), source = %self.source, "replaying recipe");
        ops.apply_chain(&self.steps, image)
    }
}

impl FromStr for Recipe {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse a quoted path and reject anything after it.
fn parse_path(rest: &str) -> Result<String, ScriptErrorKind> {
    let (path, tail) = unquote(rest)?;
    let tail = tail.trim();
    if tail.is_empty() {
        Ok(path)
    } else {
        Err(ScriptErrorKind::TrailingContent(tail.to_owned()))
    }
}

/// Split a leading double-quoted literal off `s`, returning its
/// unescaped contents and the remainder.
fn unquote(s: &str) -> Result<(String, &str), ScriptErrorKind> {
    let Some(body) = s.strip_prefix('"') else {
        return Err(if s.is_empty() {
            ScriptErrorKind::UnterminatedString
        } else {
            ScriptErrorKind::TrailingContent(s.to_owned())
        });
    };

    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &body[i + 1..])),
            '\\' => match chars.next() {
                Some((_, '\\')) => out.push('\\'),
                Some((_, '"')) => out.push('"'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, other)) => return Err(ScriptErrorKind::InvalidEscape(other)),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(ScriptErrorKind::UnterminatedString)
}

/// `name=value` parameters of one statement.
struct Params<'a> {
    filter: FilterKind,
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Params<'a> {
    fn parse(filter: FilterKind, rest: &'a str) -> Result<Self, ScriptErrorKind> {
        let pairs = rest
            .split_whitespace()
            .map(|token| {
                token
                    .split_once('=')
                    .ok_or_else(|| ScriptErrorKind::UnexpectedParameter(token.to_owned()))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { filter, pairs })
    }

    fn take<T: FromStr>(&mut self, name: &'static str) -> Result<T, ScriptErrorKind> {
        let pos = self
            .pairs
            .iter()
            .position(|(key, _)| *key == name)
            .ok_or(ScriptErrorKind::MissingParameter {
                filter: self.filter,
                name,
            })?;
        let (_, value) = self.pairs.remove(pos);
        value.parse().map_err(|_| ScriptErrorKind::BadParameter {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }

    fn finish(self) -> Result<(), ScriptErrorKind> {
        match self.pairs.first() {
            None => Ok(()),
            Some((key, value)) => Err(ScriptErrorKind::UnexpectedParameter(format!(
                "{key}={value}"
            ))),
        }
    }
}

fn parse_step(word: &str, rest: &str) -> Result<FilterSpec, ScriptErrorKind> {
    let kind: FilterKind = word
        .parse()
        .map_err(|_| ScriptErrorKind::UnknownFilter(word.to_owned()))?;
    let mut params = Params::parse(kind, rest)?;

    let spec = match kind {
        FilterKind::Grayscale => FilterSpec::Grayscale,
        FilterKind::Sepia => FilterSpec::Sepia,
        FilterKind::Blur => FilterSpec::Blur {
            kernel_size: params.take("kernel_size")?,
        },
        FilterKind::EdgeDetect => {
            let low: i32 = params.take("low")?;
            let high: i32 = params.take("high")?;
            if low.checked_mul(2) != Some(high) {
                return Err(ScriptErrorKind::ThresholdRatio { low, high });
            }
            FilterSpec::EdgeDetect { threshold: low }
        }
        FilterKind::Brightness => FilterSpec::Brightness {
            delta: params.take("delta")?,
        },
        FilterKind::Contrast => FilterSpec::Contrast {
            scale: params.take("scale")?,
        },
    };
    params.finish()?;
    Ok(spec.validated())
}
