// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error(transparent)]
    Store(#[from] imbridge_store::StoreError),
    #[error("attachment fetch failed: {0}")]
    Fetch(String),
}

pub type BackfillResult<T> = Result<T, BackfillError>;
