// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutboundError {
    #[error(transparent)]
    Dispatch(#[from] imbridge_dispatch::DispatchError),
    #[error("protocol send failed: {0}")]
    Push(String),
    #[error("audio container error: {0}")]
    Codec(String),
}

pub type OutboundResult<T> = Result<T, OutboundError>;

impl From<std::io::Error> for OutboundError {
    fn from(err: std::io::Error) -> Self {
        OutboundError::Codec(err.to_string())
    }
}

impl From<ogg::reading::OggReadError> for OutboundError {
    fn from(err: ogg::reading::OggReadError) -> Self {
        OutboundError::Codec(err.to_string())
    }
}
