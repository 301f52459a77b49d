// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod alias;
pub mod lookup;
pub mod normalize;
pub mod resolve;

pub use alias::{reconcile_group_alias, AliasLookup, AliasSource};
pub use lookup::{ChatLookup, Contact, ContactSource, NoContacts};
pub use resolve::{
    classify_push_conversation, merge_portal, pick_reachable, resolve_chat_portal, resolve_portal,
    ResolutionInput,
};
