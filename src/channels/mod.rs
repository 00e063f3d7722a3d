//! Network surfaces through which users reach the matter workflow.

pub mod web;
