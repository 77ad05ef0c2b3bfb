// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Command-template hydration.
//!
//! The recovery module publishes its email command templates as token lists,
//! e.g. `["Accept", "guardian", "request", "for", "{ethAddr}"]`. A command is
//! the tokens joined with single spaces, with each placeholder substituted
//! once.

use super::error::PreconditionError;

/// Template index used for every acceptance and recovery command.
pub const TEMPLATE_IDX: usize = 0;

pub const ETH_ADDR_PLACEHOLDER: &str = "{ethAddr}";
pub const STRING_PLACEHOLDER: &str = "{string}";

/// Join template `idx` and substitute the first occurrence of each
/// placeholder with its value.
pub fn hydrate_command(
    templates: &[Vec<String>],
    idx: usize,
    substitutions: &[(&str, &str)],
) -> Result<String, PreconditionError> {
    let template = templates
        .get(idx)
        .filter(|tokens| !tokens.is_empty())
        .ok_or(PreconditionError::MissingCommandTemplate { index: idx })?;

    let mut command = template.join(" ");
    for (placeholder, value) in substitutions {
        if !command.contains(placeholder) {
            return Err(PreconditionError::TemplatePlaceholderMissing {
                placeholder: placeholder.to_string(),
            });
        }
        command = command.replacen(placeholder, value, 1);
    }
    Ok(command)
}
