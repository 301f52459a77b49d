// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] imbridge_store::StoreError),
    #[error("sink rejected event: {0}")]
    Sink(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
