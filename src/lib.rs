//! # CRM Telegram Bot
//!
//! Customer-facing Telegram front end for the C0de CRM. Customers create
//! and track orders through a guided conversation and chat with the team
//! about open orders; the CRM pushes notifications back through an HTTP
//! webhook served by the same process.

pub mod bot;
pub mod config;
pub mod context;
pub mod crm;
pub mod dialogue;
pub mod localization;
pub mod messaging;
pub mod pagination;
pub mod session;
pub mod validation;
pub mod webhook;
