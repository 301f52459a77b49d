// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! TEXT-column encodings for the small enums in the data model.

use imbridge_common::{ChatService, ChatStyle, TapbackType};

pub fn style_to_str(style: ChatStyle) -> &'static str {
    match style {
        ChatStyle::Group => "GROUP",
        ChatStyle::Dm => "DM",
    }
}

pub fn style_from_str(s: &str) -> ChatStyle {
    match s {
        "GROUP" => ChatStyle::Group,
        _ => ChatStyle::Dm,
    }
}

pub fn service_to_str(service: ChatService) -> &'static str {
    match service {
        ChatService::Primary => "PRIMARY",
        ChatService::Legacy => "LEGACY",
    }
}

pub fn service_from_str(s: &str) -> ChatService {
    match s {
        "LEGACY" => ChatService::Legacy,
        _ => ChatService::Primary,
    }
}

pub fn tapback_to_str(t: TapbackType) -> &'static str {
    match t {
        TapbackType::Like => "LIKE",
        TapbackType::Love => "LOVE",
        TapbackType::Dislike => "DISLIKE",
        TapbackType::Laugh => "LAUGH",
        TapbackType::Emphasis => "EMPHASIS",
        TapbackType::Question => "QUESTION",
        TapbackType::Emoji => "EMOJI",
    }
}

pub fn tapback_from_str(s: &str) -> TapbackType {
    match s {
        "LOVE" => TapbackType::Love,
        "DISLIKE" => TapbackType::Dislike,
        "LAUGH" => TapbackType::Laugh,
        "EMPHASIS" => TapbackType::Emphasis,
        "QUESTION" => TapbackType::Question,
        "EMOJI" => TapbackType::Emoji,
        _ => TapbackType::Like,
    }
}
