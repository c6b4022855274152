//! Routine signatures.
//!
//! A signature is an ordered list of parameters, each tagged with the way
//! it accepts arguments. Parameter kinds must appear in the canonical order
//!
//! ```text
//! positional-only, positional-or-keyword, *var-positional, keyword-only, **var-keyword
//! ```
//!
//! which is the only layout a dynamic call can bind unambiguously. A
//! parameter declared after `*args` is keyword-only.

use crate::value::Value;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Parameter
// =============================================================================

/// How a parameter accepts arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamKind {
    /// Bound only by position.
    PositionalOnly,
    /// Bound by position or by keyword.
    PositionalOrKeyword,
    /// Collects excess positional arguments into a tuple.
    VarPositional,
    /// Bound only by keyword.
    KeywordOnly,
    /// Collects excess keyword arguments into a dict.
    VarKeyword,
}

impl ParamKind {
    #[inline]
    pub const fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    /// Whether a positional argument can fill this parameter directly.
    #[inline]
    pub const fn accepts_positional(self) -> bool {
        matches!(
            self,
            ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword
        )
    }

    /// Whether a keyword argument can fill this parameter directly.
    #[inline]
    pub const fn accepts_keyword(self) -> bool {
        matches!(self, ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly)
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Arc<str>,
    pub kind: ParamKind,
    /// Value used when the call supplies none.
    pub default: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<Arc<str>>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Malformed signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("duplicate argument '{0}' in function definition")]
    DuplicateName(Arc<str>),
    #[error("parameter '{name}' is out of order")]
    OutOfOrder { name: Arc<str> },
    #[error("variadic parameter '{0}' cannot have a default value")]
    VariadicDefault(Arc<str>),
    #[error("non-default argument '{0}' follows default argument")]
    NonDefaultAfterDefault(Arc<str>),
}

// =============================================================================
// Default Table
// =============================================================================

/// Name-keyed default values carried by a routine.
///
/// Routines rebuilt around a new body inherit this table, so defaults
/// follow parameter names rather than positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultTable {
    entries: SmallVec<[(Arc<str>, Value); 4]>,
}

impl DefaultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the declared defaults of a signature.
    pub fn from_signature(signature: &Signature) -> Self {
        let entries = signature
            .params()
            .iter()
            .filter_map(|p| p.default.clone().map(|d| (Arc::clone(&p.name), d)))
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    /// Set a default, replacing any existing entry for the name.
    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Signature
// =============================================================================

/// Ordered parameter list of a routine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: SmallVec<[Parameter; 6]>,
}

impl Signature {
    /// Validate and build a signature from parameters in declaration order.
    pub fn new(params: impl IntoIterator<Item = Parameter>) -> Result<Self, SignatureError> {
        let params: SmallVec<[Parameter; 6]> = params.into_iter().collect();
        let mut seen_default = false;

        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(SignatureError::DuplicateName(Arc::clone(&param.name)));
            }
            if let Some(prev) = i.checked_sub(1).map(|j| &params[j]) {
                let repeated_variadic = prev.kind == param.kind && param.kind.is_variadic();
                if prev.kind > param.kind || repeated_variadic {
                    return Err(SignatureError::OutOfOrder {
                        name: Arc::clone(&param.name),
                    });
                }
            }
            if param.kind.is_variadic() && param.default.is_some() {
                return Err(SignatureError::VariadicDefault(Arc::clone(&param.name)));
            }
            if param.kind.accepts_positional() {
                if param.default.is_some() {
                    seen_default = true;
                } else if seen_default {
                    return Err(SignatureError::NonDefaultAfterDefault(Arc::clone(
                        &param.name,
                    )));
                }
            }
        }

        Ok(Self { params })
    }

    /// Start building a signature parameter by parameter.
    pub fn builder() -> SignatureBuilder {
        SignatureBuilder::default()
    }

    /// Signature of plain positional-or-keyword parameters.
    pub fn positional(names: &[&str]) -> Self {
        Self {
            params: names
                .iter()
                .map(|n| Parameter::new(*n, ParamKind::PositionalOrKeyword))
                .collect(),
        }
    }

    #[inline]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.params.iter().map(|p| &p.name)
    }

    /// Parameters that a positional argument can fill, in order.
    pub fn positional_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.kind.accepts_positional())
    }

    pub fn positional_count(&self) -> usize {
        self.positional_params().count()
    }

    pub fn keyword_only(&self) -> impl Iterator<Item = &Parameter> {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::KeywordOnly)
    }

    pub fn var_positional(&self) -> Option<&Parameter> {
        self.params
            .iter()
            .find(|p| p.kind == ParamKind::VarPositional)
    }

    pub fn var_keyword(&self) -> Option<&Parameter> {
        self.params.iter().find(|p| p.kind == ParamKind::VarKeyword)
    }

    /// True when the first declared parameter is `*args`.
    ///
    /// Such a signature consumes no positional slot by name: every named
    /// parameter after it is keyword-only.
    pub fn first_is_var_positional(&self) -> bool {
        self.params
            .first()
            .is_some_and(|p| p.kind == ParamKind::VarPositional)
    }

    /// Index of the parameter with the given name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name.as_ref() == name)
    }

    /// Index of a parameter a keyword argument with this name would fill.
    pub fn find_keyword(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.kind.accepts_keyword() && p.name.as_ref() == name)
    }

    /// This signature with defaults taken from `table` where it names a
    /// non-variadic parameter. Entries in `table` override declared ones.
    pub fn with_defaults<'a>(&'a self, table: &DefaultTable) -> Cow<'a, Signature> {
        let applies = table.iter().any(|(name, value)| {
            self.find(name).is_some_and(|i| {
                let p = &self.params[i];
                !p.kind.is_variadic() && p.default.as_ref() != Some(value)
            })
        });
        if !applies {
            return Cow::Borrowed(self);
        }

        let mut merged = self.clone();
        for param in merged.params.iter_mut() {
            if param.kind.is_variadic() {
                continue;
            }
            if let Some(value) = table.get(&param.name) {
                param.default = Some(value.clone());
            }
        }
        Cow::Owned(merged)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Incremental signature construction.
///
/// Named parameters added after [`var_positional`](Self::var_positional)
/// become keyword-only.
#[derive(Debug, Default)]
pub struct SignatureBuilder {
    params: Vec<Parameter>,
    after_star: bool,
}

impl SignatureBuilder {
    pub fn positional_only(mut self, name: &str) -> Self {
        self.params
            .push(Parameter::new(name, ParamKind::PositionalOnly));
        self
    }

    /// A positional-or-keyword parameter (keyword-only after `*args`).
    pub fn param(mut self, name: &str) -> Self {
        let kind = self.named_kind();
        self.params.push(Parameter::new(name, kind));
        self
    }

    pub fn param_with_default(mut self, name: &str, default: Value) -> Self {
        let kind = self.named_kind();
        self.params
            .push(Parameter::new(name, kind).with_default(default));
        self
    }

    pub fn keyword_only(mut self, name: &str) -> Self {
        self.params.push(Parameter::new(name, ParamKind::KeywordOnly));
        self
    }

    pub fn var_positional(mut self, name: &str) -> Self {
        self.after_star = true;
        self.params
            .push(Parameter::new(name, ParamKind::VarPositional));
        self
    }

    pub fn var_keyword(mut self, name: &str) -> Self {
        self.params.push(Parameter::new(name, ParamKind::VarKeyword));
        self
    }

    pub fn build(self) -> Result<Signature, SignatureError> {
        Signature::new(self.params)
    }

    fn named_kind(&self) -> ParamKind {
        if self.after_star {
            ParamKind::KeywordOnly
        } else {
            ParamKind::PositionalOrKeyword
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
