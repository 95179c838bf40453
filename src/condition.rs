//! MSBuild `Condition` attributes: rendering and evaluation.
//!
//! The writer guards every configuration-scoped element with
//! [`configuration_condition`]; the read-back side parses those attributes
//! again to decide which configuration an element applies to.
//!
//! Supported grammar (keywords case-insensitive):
//!
//! ```text
//! condition   = conjunction ('or' conjunction)*
//! conjunction = term ('and' term)*
//! term        = comparison | exists | '(' condition ')'
//! comparison  = operand ('==' | '!=') operand
//! exists      = 'exists' '(' operand ')'
//! operand     = "'" chars "'"
//! ```
//!
//! Parsing uses [`chumsky`].

use std::collections::HashMap;

use chumsky::prelude::*;

use crate::error::{Result, VcxprojError};

// ═══════════════════════════════════════════════════════════════════════════════
//  Rendering
// ═══════════════════════════════════════════════════════════════════════════════

/// `'$(Configuration)|$(Platform)'=='<variant>|<platform>'`
///
/// Values are inserted as given; escaping for XML is the caller's job.
pub fn configuration_condition(variant: &str, platform: &str) -> String {
    format!("'$(Configuration)|$(Platform)'=='{variant}|{platform}'")
}

/// Property bindings that make [`configuration_condition`] hold for the
/// given pair.
pub fn configuration_vars(variant: &str, platform: &str) -> HashMap<String, String> {
    HashMap::from([
        ("Configuration".to_string(), variant.to_string()),
        ("Platform".to_string(), platform.to_string()),
    ])
}

// ═══════════════════════════════════════════════════════════════════════════════
//  AST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Operand, Operand),
    NotEquals(Operand, Operand),
    /// `exists('…')`.  No filesystem lookups happen here; it always holds.
    Exists(Operand),
    /// Every term must hold (`and`).
    All(Vec<Condition>),
    /// At least one term must hold (`or`).
    Any(Vec<Condition>),
}

/// Contents of a single-quoted string, split around `$(Property)` references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operand(pub Vec<Fragment>);

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Property(String),
}

impl Operand {
    fn parse(raw: &str) -> Self {
        let mut fragments = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find("$(") {
            let Some(len) = rest[start + 2..].find(')') else {
                break;
            };
            if start > 0 {
                fragments.push(Fragment::Text(rest[..start].to_string()));
            }
            fragments.push(Fragment::Property(rest[start + 2..start + 2 + len].to_string()));
            rest = &rest[start + 2 + len + 1..];
        }
        if !rest.is_empty() {
            fragments.push(Fragment::Text(rest.to_string()));
        }

        Self(fragments)
    }

    /// Substitute property references; unknown properties are empty.
    pub fn expand(&self, vars: &HashMap<String, String>) -> String {
        self.0
            .iter()
            .map(|fragment| match fragment {
                Fragment::Text(text) => text.as_str(),
                Fragment::Property(name) => vars.get(name).map(String::as_str).unwrap_or(""),
            })
            .collect()
    }
}

/// Expand `$(Property)` references in free text such as an `<OutDir>` value.
pub fn expand_properties(text: &str, vars: &HashMap<String, String>) -> String {
    Operand::parse(text).expand(vars)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Parser
// ═══════════════════════════════════════════════════════════════════════════════

type ParseErr<'a> = extra::Err<Simple<'a, char>>;

fn operand<'a>() -> impl Parser<'a, &'a str, Operand, ParseErr<'a>> + Clone {
    just('\'')
        .ignore_then(none_of('\'').repeated().to_slice())
        .then_ignore(just('\''))
        .map(Operand::parse)
        .padded()
}

fn keyword<'a>(word: &'static str) -> impl Parser<'a, &'a str, &'a str, ParseErr<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .repeated()
        .at_least(1)
        .to_slice()
        .filter(move |found: &&str| found.eq_ignore_ascii_case(word))
        .padded()
}

/// One term stays itself; several are wrapped.
fn collapse(mut terms: Vec<Condition>, wrap: fn(Vec<Condition>) -> Condition) -> Condition {
    if terms.len() == 1 {
        if let Some(only) = terms.pop() {
            return only;
        }
    }
    wrap(terms)
}

fn condition_parser<'a>() -> impl Parser<'a, &'a str, Condition, ParseErr<'a>> {
    recursive(|condition| {
        let operator = just("==").to(true).or(just("!=").to(false)).padded();

        let comparison = operand()
            .then(operator)
            .then(operand())
            .map(|((lhs, equal), rhs)| match equal {
                true => Condition::Equals(lhs, rhs),
                false => Condition::NotEquals(lhs, rhs),
            });

        let exists = keyword("exists")
            .ignore_then(operand().delimited_by(just('(').padded(), just(')').padded()))
            .map(Condition::Exists);

        let group = condition.delimited_by(just('(').padded(), just(')').padded());

        let term = choice((comparison, exists, group)).padded();

        let conjunction = term
            .separated_by(keyword("and"))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|terms| collapse(terms, Condition::All));

        conjunction
            .separated_by(keyword("or"))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|terms| collapse(terms, Condition::Any))
    })
}

/// Parse a `Condition` attribute value.
pub fn parse_condition(input: &str) -> Result<Condition> {
    condition_parser()
        .parse(input)
        .into_result()
        .map_err(|errs| {
            let details: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
            VcxprojError::Condition(format!(
                "cannot parse condition '{input}': {}",
                details.join("; ")
            ))
        })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Evaluation
// ═══════════════════════════════════════════════════════════════════════════════

/// Evaluate against property bindings.  String comparison ignores ASCII
/// case, as MSBuild does.
pub fn evaluate(condition: &Condition, vars: &HashMap<String, String>) -> bool {
    match condition {
        Condition::Equals(lhs, rhs) => lhs.expand(vars).eq_ignore_ascii_case(&rhs.expand(vars)),
        Condition::NotEquals(lhs, rhs) => {
            !lhs.expand(vars).eq_ignore_ascii_case(&rhs.expand(vars))
        }
        Condition::Exists(_) => true,
        Condition::All(terms) => terms.iter().all(|t| evaluate(t, vars)),
        Condition::Any(terms) => terms.iter().any(|t| evaluate(t, vars)),
    }
}

/// Parse and evaluate in one go.
pub fn holds(input: &str, vars: &HashMap<String, String>) -> Result<bool> {
    parse_condition(input).map(|condition| evaluate(&condition, vars))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Fragment {
        Fragment::Text(s.into())
    }

    fn prop(s: &str) -> Fragment {
        Fragment::Property(s.into())
    }

    // ── Operands ─────────────────────────────────────────────────────────

    #[test]
    fn operand_configuration_pair() {
        assert_eq!(
            Operand::parse("$(Configuration)|$(Platform)"),
            Operand(vec![prop("Configuration"), text("|"), prop("Platform")])
        );
    }

    #[test]
    fn operand_plain_text() {
        assert_eq!(Operand::parse("Debug|Win32"), Operand(vec![text("Debug|Win32")]));
        assert_eq!(Operand::parse(""), Operand::default());
    }

    #[test]
    fn operand_unterminated_reference_is_text() {
        assert_eq!(Operand::parse("$(Oops"), Operand(vec![text("$(Oops")]));
    }

    #[test]
    fn expand_out_dir() {
        let vars = configuration_vars("Release", "x64");
        assert_eq!(
            expand_properties(r"..\build\$(Configuration)\$(Platform)\", &vars),
            r"..\build\Release\x64\"
        );
        assert_eq!(expand_properties("$(Unknown)x", &vars), "x");
    }

    // ── Parsing ──────────────────────────────────────────────────────────

    #[test]
    fn parse_rendered_configuration_condition() {
        let parsed = parse_condition(&configuration_condition("Debug", "Win32")).unwrap();
        assert_eq!(
            parsed,
            Condition::Equals(
                Operand(vec![prop("Configuration"), text("|"), prop("Platform")]),
                Operand(vec![text("Debug|Win32")]),
            )
        );
    }

    #[test]
    fn parse_not_equals_with_spaces() {
        let parsed = parse_condition(" '$(Platform)' != '' ").unwrap();
        assert_eq!(
            parsed,
            Condition::NotEquals(Operand(vec![prop("Platform")]), Operand::default())
        );
    }

    #[test]
    fn parse_exists_lowercase() {
        let parsed = parse_condition(
            r"exists('$(UserRootDir)\Microsoft.Cpp.$(Platform).user.props')",
        )
        .unwrap();
        assert!(matches!(parsed, Condition::Exists(_)));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let parsed = parse_condition(
            "'$(Configuration)'=='Debug' and '$(Platform)'=='Win32' or '$(Platform)'=='x64'",
        )
        .unwrap();
        match parsed {
            Condition::Any(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(&terms[0], Condition::All(inner) if inner.len() == 2));
                assert!(matches!(&terms[1], Condition::Equals(..)));
            }
            other => panic!("expected Any, got {other:?}"),
        }
    }

    #[test]
    fn parse_parenthesized_group() {
        let parsed =
            parse_condition("('$(A)'=='1' Or '$(B)'=='1') AND '$(C)'!=''").unwrap();
        match parsed {
            Condition::All(terms) => assert!(matches!(&terms[0], Condition::Any(_))),
            other => panic!("expected All, got {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_condition("Debug|Win32").is_err());
        assert!(parse_condition("'a'==").is_err());
        assert!(parse_condition("").is_err());
    }

    // ── Evaluation ───────────────────────────────────────────────────────

    #[test]
    fn configuration_condition_matches_only_its_pair() {
        let cond = configuration_condition("Debug", "Win32");
        assert!(holds(&cond, &configuration_vars("Debug", "Win32")).unwrap());
        assert!(!holds(&cond, &configuration_vars("Release", "Win32")).unwrap());
        assert!(!holds(&cond, &configuration_vars("Debug", "x64")).unwrap());
    }

    #[test]
    fn comparison_ignores_case() {
        let cond = configuration_condition("debug", "WIN32");
        assert!(holds(&cond, &configuration_vars("Debug", "Win32")).unwrap());
    }

    #[test]
    fn exists_always_holds() {
        assert!(holds("exists('nowhere')", &HashMap::new()).unwrap());
    }

    #[test]
    fn compound_evaluation() {
        let cond = "('$(Configuration)'=='Debug' or '$(Configuration)'=='Checked') and '$(Platform)'=='x64'";
        assert!(holds(cond, &configuration_vars("Checked", "x64")).unwrap());
        assert!(!holds(cond, &configuration_vars("Checked", "Win32")).unwrap());
        assert!(!holds(cond, &configuration_vars("Release", "x64")).unwrap());
    }

    #[test]
    fn unknown_property_is_empty() {
        assert!(holds("'$(Nope)'==''", &HashMap::new()).unwrap());
    }
}
