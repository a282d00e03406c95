//! Signature matching for overloaded methods and constructors.
//!
//! Candidates are scanned in their introspected order; the first one whose
//! arity equals the argument count and whose every parameter coerces is
//! selected. There is no scoring across multiple valid matches - resolution
//! is deliberately order-sensitive and deterministic. The same machinery
//! serves method overloads and constructor overloads; only the candidate
//! source differs.

use tracing::{debug, trace};

use crate::coerce::Coercer;
use crate::error::CoercionError;
use crate::host::HostValue;
use crate::host_type::HostType;
use crate::script_value::ScriptValue;

/// One callable's declared parameter list, considered during resolution.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSignature<'a> {
    /// Position of the callable in its introspected candidate list; handed
    /// back on success so the caller can invoke the right overload.
    pub index: usize,
    pub params: &'a [HostType],
}

/// Why no candidate was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    /// No candidate even had the right number of parameters.
    NoArityMatch,
    /// At least one candidate had the right arity, but none coerced fully.
    NoCoercibleCandidate,
}

/// A successful match: the chosen candidate plus the fully coerced arguments.
#[derive(Debug)]
pub struct SignatureMatch {
    pub index: usize,
    pub args: Vec<HostValue>,
}

pub type MatchResult = Result<SignatureMatch, NoMatchReason>;

/// Scan `candidates` against `args`, returning the first full match.
pub fn select<'a, I>(coercer: &Coercer<'_>, candidates: I, args: &[ScriptValue]) -> MatchResult
where
    I: IntoIterator<Item = CandidateSignature<'a>>,
{
    let mut saw_arity_match = false;
    for candidate in candidates {
        if candidate.params.len() != args.len() {
            continue;
        }
        saw_arity_match = true;
        match try_coerce_all(coercer, candidate.params, args) {
            Ok(coerced) => {
                debug!(index = candidate.index, "signature selected");
                return Ok(SignatureMatch {
                    index: candidate.index,
                    args: coerced,
                });
            }
            // Recovered locally: the next candidate is still tried.
            Err(reason) => {
                trace!(index = candidate.index, %reason, "candidate rejected");
            }
        }
    }
    Err(if saw_arity_match {
        NoMatchReason::NoCoercibleCandidate
    } else {
        NoMatchReason::NoArityMatch
    })
}

/// Eager per-parameter coercion; the signature is accepted only if every
/// position succeeds.
fn try_coerce_all(
    coercer: &Coercer<'_>,
    params: &[HostType],
    args: &[ScriptValue],
) -> Result<Vec<HostValue>, CoercionError> {
    params
        .iter()
        .zip(args)
        .map(|(param, arg)| coercer.coerce(arg, param))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::handles::HandleTable;
    use crate::host::HostRegistry;
    use crate::host_type::{FloatWidth, IntWidth};

    struct Fixture {
        classes: HostRegistry,
        objects: HandleTable,
        config: BridgeConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                classes: HostRegistry::new(),
                objects: HandleTable::new(),
                config: BridgeConfig::default(),
            }
        }

        fn coercer(&self) -> Coercer<'_> {
            Coercer::new(&self.classes, &self.objects, &self.config)
        }
    }

    fn candidates<'a>(lists: &'a [Vec<HostType>]) -> Vec<CandidateSignature<'a>> {
        lists
            .iter()
            .enumerate()
            .map(|(index, params)| CandidateSignature {
                index,
                params: params.as_slice(),
            })
            .collect()
    }

    #[test]
    fn unique_match_found_regardless_of_position() {
        let fx = Fixture::new();
        let lists = vec![
            vec![HostType::Bool],
            vec![HostType::Bool, HostType::Bool],
            vec![HostType::Str],
            vec![HostType::Float(FloatWidth::F64), HostType::Str],
        ];
        let args = vec![ScriptValue::String("x".into())];

        let selected = select(&fx.coercer(), candidates(&lists), &args).unwrap();
        assert_eq!(selected.index, 2);
        assert_eq!(selected.args, vec![HostValue::Str("x".into())]);
    }

    #[test]
    fn overloads_discriminate_on_argument_tag() {
        let fx = Fixture::new();
        // f(int) and f(String)
        let lists = vec![vec![HostType::Int(IntWidth::I32)], vec![HostType::Str]];

        let by_number = select(
            &fx.coercer(),
            candidates(&lists),
            &[ScriptValue::Number(7.0)],
        )
        .unwrap();
        assert_eq!(by_number.index, 0);
        assert_eq!(by_number.args, vec![HostValue::Int32(7)]);

        let by_string = select(
            &fx.coercer(),
            candidates(&lists),
            &[ScriptValue::String("s".into())],
        )
        .unwrap();
        assert_eq!(by_string.index, 1);
    }

    #[test]
    fn first_eligible_wins_when_several_match() {
        let fx = Fixture::new();
        // Both accept a number; discovery order decides.
        let lists = vec![
            vec![HostType::Float(FloatWidth::F64)],
            vec![HostType::Int(IntWidth::I32)],
        ];
        let selected = select(
            &fx.coercer(),
            candidates(&lists),
            &[ScriptValue::Number(1.5)],
        )
        .unwrap();
        assert_eq!(selected.index, 0);
        assert_eq!(selected.args, vec![HostValue::Float64(1.5)]);
    }

    #[test]
    fn arity_is_a_hard_filter() {
        let fx = Fixture::new();
        let lists = vec![vec![HostType::Str, HostType::Str]];
        let result = select(
            &fx.coercer(),
            candidates(&lists),
            &[ScriptValue::String("only one".into())],
        );
        assert_eq!(result.unwrap_err(), NoMatchReason::NoArityMatch);
    }

    #[test]
    fn coercion_failure_distinguished_from_arity_failure() {
        let fx = Fixture::new();
        let lists = vec![vec![HostType::Bool]];
        let result = select(
            &fx.coercer(),
            candidates(&lists),
            &[ScriptValue::Number(1.0)],
        );
        assert_eq!(result.unwrap_err(), NoMatchReason::NoCoercibleCandidate);
    }

    #[test]
    fn every_parameter_must_coerce() {
        let fx = Fixture::new();
        // Second position cannot take a boolean, so the whole candidate fails.
        let lists = vec![vec![HostType::Str, HostType::Str]];
        let result = select(
            &fx.coercer(),
            candidates(&lists),
            &[
                ScriptValue::String("ok".into()),
                ScriptValue::Boolean(true),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_candidate_set_is_no_arity_match() {
        let fx = Fixture::new();
        let result = select(&fx.coercer(), candidates(&[]), &[]);
        assert_eq!(result.unwrap_err(), NoMatchReason::NoArityMatch);
    }
}
