//! Anonymizing relay component: derives per-peer aliases for addresses
//! on a messaging network and rewrites stanzas between an address's
//! real identity and its alias, so correspondents only ever see aliases
//! for each other.

pub mod address;
pub mod alias;
pub mod cipher;
pub mod crypto;
pub mod error;
pub mod relay;
pub mod settings;
pub mod storage;
