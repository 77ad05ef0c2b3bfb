// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::blockchain::DelegationSender;

#[derive(Clone)]
pub struct AppState {
    pub delegation: Arc<dyn DelegationSender>,
}

impl AppState {
    pub fn new(delegation: Arc<dyn DelegationSender>) -> Self {
        Self { delegation }
    }
}
