//! Nom-based IRC message parsing.
//!
//! IRC message format:
//!
//! ```text
//! [@tags] [:source] <command> [params...] [:trailing]
//! ```
//!
//! IRCv3 tags are consumed and discarded; the bot engine negotiates no
//! capabilities and a client must tolerate servers that send tags
//! anyway.

use crate::error::ProtoError;
use crate::source::Source;
use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    sequence::preceded,
    IResult,
};
use std::fmt;
use std::str::FromStr;

/// An owned, parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// Who the line came from, when the server included a prefix.
    pub source: Option<Source>,
    /// Command verb (`PRIVMSG`, `JOIN`, ...) or three-digit numeric.
    pub command: String,
    /// Parameters, trailing included as the last element.
    pub params: Vec<String>,
}

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    // RFC 2812: command = 1*letter / 3digit
    let all_letters = cmd.bytes().all(|b| b.is_ascii_alphabetic());
    let three_digits = cmd.len() == 3 && cmd.bytes().all(|b| b.is_ascii_digit());
    if all_letters || three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::AlphaNumeric,
        )))
    }
}

/// Split the remainder after the command into middle and trailing params.
/// Consecutive spaces collapse; a `:` starts the trailing parameter.
fn parse_params(input: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() || rest.starts_with('\r') || rest.starts_with('\n') {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            let end = trailing.find(['\r', '\n']).unwrap_or(trailing.len());
            params.push(trailing[..end].to_string());
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(rest[..end].to_string());
        rest = &rest[end..];
    }

    params
}

impl Message {
    /// Parse one IRC line into an owned message.
    ///
    /// Line terminators are tolerated but not required. On failure the
    /// returned error carries whatever prefix/command was recognized.
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let input = line.trim_end_matches(['\r', '\n']);
        if input.trim().is_empty() {
            return Err(ProtoError::Empty);
        }

        let (input, _tags) = opt(parse_tags)(input).unwrap_or((input, None));
        let (input, _) = space0::<_, nom::error::Error<&str>>(input)
            .unwrap_or((input, ""));
        let (input, prefix) = opt(parse_prefix)(input).unwrap_or((input, None));
        let (input, _) = space0::<_, nom::error::Error<&str>>(input)
            .unwrap_or((input, ""));

        let source = prefix.map(Source::parse);

        match parse_command(input) {
            Ok((rest, cmd)) => Ok(Message {
                source,
                command: cmd.to_ascii_uppercase(),
                params: parse_params(rest),
            }),
            Err(_) => {
                let position = line.len() - input.len();
                Err(ProtoError::Malformed {
                    position,
                    detail: "expected command verb or 3-digit numeric".to_string(),
                    partial: Box::new(Message {
                        source,
                        command: String::new(),
                        params: Vec::new(),
                    }),
                })
            }
        }
    }

    /// Numeric reply code, when the command is a three-digit numeric.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Parameter at `idx`, if present.
    pub fn param(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).map(String::as_str)
    }

    /// Nickname of the sender, if the line had a user source.
    pub fn sender_nick(&self) -> Option<&str> {
        self.source
            .as_ref()
            .filter(|s| !s.is_server())
            .map(|s| s.nick.as_str())
    }
}

impl FromStr for Message {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, ":{source} ")?;
        }
        write!(f, "{}", self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for p in middle {
                write!(f, " {p}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}
