//! Reroute Rule Compiler
//!
//! This crate compiles redirect rules into the browser's declarative
//! redirect directives and installs them through a [`DirectiveSink`].

pub mod compiler;
pub mod directive;
pub mod evaluate;
pub mod install;

pub use compiler::{compile, compile_book, escape_regex};
pub use directive::{Directive, DirectiveKind, NativeRule};
pub use evaluate::{EvalError, Redirect, RuleEvaluator};
pub use install::{DirectiveSink, InstallError, InstallOutcome, InstallPlan, Installer};
