//! Session-key validation engine for a modular smart-contract wallet.
//!
//! This crate models the permission-evaluation subsystem of an ERC-4337 style
//! account: a wallet delegates narrowly-scoped execution rights to *operator*
//! keys, each grant described by a [`Session`] committed into a Merkle root.
//! At validation time the engine decodes the wallet operation and the extended
//! signature payload, checks spending/gas/usage budgets, proves session
//! membership, interprets the session's argument predicate tree against the
//! actual call arguments, and verifies the operator's signature, returning the
//! packed validation word the wallet's generic authorization path expects.
//!
//! The host wallet's execution path, its module/hook bookkeeping and key
//! custody are external collaborators; only the validation logic lives here.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod accounting;
pub use accounting::*;

mod error;
pub use error::*;

mod merkle;
pub use merkle::*;

mod permission;
pub use permission::*;

mod permit;
pub use permit::*;

mod predicate;
pub use predicate::*;

mod registry;
pub use registry::*;

mod session;
pub use session::*;

mod signature;
pub use signature::*;

mod state;
pub use state::*;

mod types;
pub use types::*;

mod validator;
pub use validator::*;

mod wire;
pub use wire::*;
