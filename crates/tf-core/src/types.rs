//! Core type definitions for TubeFocus
//!
//! These types mirror the wire shapes exchanged with the browser: the
//! declarative rule table on one side and the settings store on the other.
//! The `ts_rs` derives keep the extension UI's TypeScript bindings in sync.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Rule Identifiers
// =============================================================================

/// Identifier of an installed rule. Globally unique across the whole table.
pub type RuleId = u32;

// =============================================================================
// Resource Types (wire enum + scope masks)
// =============================================================================

/// Request resource type, named exactly as the rule host names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ResourceType {
    #[serde(rename = "main_frame")]
    MainFrame,
    #[serde(rename = "sub_frame")]
    SubFrame,
    #[serde(rename = "stylesheet")]
    Stylesheet,
    #[serde(rename = "script")]
    Script,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "font")]
    Font,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "xmlhttprequest")]
    XmlHttpRequest,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "csp_report")]
    CspReport,
    #[serde(rename = "media")]
    Media,
    #[serde(rename = "websocket")]
    WebSocket,
    #[serde(rename = "other")]
    Other,
}

bitflags::bitflags! {
    /// Resource-type scope mask used during synthesis.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceTypeSet: u16 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const CSP_REPORT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const OTHER = 1 << 12;

        /// The scope of the high-priority tier: top-level navigations only.
        const NAVIGATION = Self::MAIN_FRAME.bits();
        /// The scope of the catch-all tier for blocked sites.
        const SUBRESOURCES = Self::SUB_FRAME.bits()
            | Self::XMLHTTPREQUEST.bits()
            | Self::SCRIPT.bits()
            | Self::OTHER.bits();
    }
}

impl ResourceTypeSet {
    /// Expand the mask into the wire representation, in declaration order.
    pub fn to_resource_types(self) -> Vec<ResourceType> {
        const TABLE: &[(ResourceTypeSet, ResourceType)] = &[
            (ResourceTypeSet::MAIN_FRAME, ResourceType::MainFrame),
            (ResourceTypeSet::SUB_FRAME, ResourceType::SubFrame),
            (ResourceTypeSet::STYLESHEET, ResourceType::Stylesheet),
            (ResourceTypeSet::SCRIPT, ResourceType::Script),
            (ResourceTypeSet::IMAGE, ResourceType::Image),
            (ResourceTypeSet::FONT, ResourceType::Font),
            (ResourceTypeSet::OBJECT, ResourceType::Object),
            (ResourceTypeSet::XMLHTTPREQUEST, ResourceType::XmlHttpRequest),
            (ResourceTypeSet::PING, ResourceType::Ping),
            (ResourceTypeSet::CSP_REPORT, ResourceType::CspReport),
            (ResourceTypeSet::MEDIA, ResourceType::Media),
            (ResourceTypeSet::WEBSOCKET, ResourceType::WebSocket),
            (ResourceTypeSet::OTHER, ResourceType::Other),
        ];

        TABLE
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, ty)| *ty)
            .collect()
    }
}

// =============================================================================
// Rules (host wire shape)
// =============================================================================

/// Match condition of an installed rule. Exactly one of `url_filter` /
/// `regex_filter` is set; the host rejects rules carrying both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_filter: Option<String>,
    pub resource_types: Vec<ResourceType>,
}

/// Redirect destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RedirectTarget {
    pub url: String,
}

/// Action taken when a rule matches. The engine only ever installs
/// redirects; the tagged encoding matches the host's `{type: ...}` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum RuleAction {
    Redirect { redirect: RedirectTarget },
}

/// One installed (or to-be-installed) declarative rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rule {
    pub id: RuleId,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl Rule {
    /// Redirect rule with a regex-anchored condition.
    pub fn regex_redirect(
        id: RuleId,
        priority: u32,
        regex_filter: impl Into<String>,
        scope: ResourceTypeSet,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id,
            priority,
            action: RuleAction::Redirect {
                redirect: RedirectTarget { url: target.into() },
            },
            condition: RuleCondition {
                url_filter: None,
                regex_filter: Some(regex_filter.into()),
                resource_types: scope.to_resource_types(),
            },
        }
    }

    /// Redirect rule with a substring `urlFilter` condition.
    pub fn url_redirect(
        id: RuleId,
        priority: u32,
        url_filter: impl Into<String>,
        scope: ResourceTypeSet,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id,
            priority,
            action: RuleAction::Redirect {
                redirect: RedirectTarget { url: target.into() },
            },
            condition: RuleCondition {
                url_filter: Some(url_filter.into()),
                regex_filter: None,
                resource_types: scope.to_resource_types(),
            },
        }
    }
}

// =============================================================================
// Block Entries (settings store shape)
// =============================================================================

/// A user-blocked website, as stored under `blockedWebsites`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BlockedWebsite {
    pub url: String,
    pub added_at: u64,
    /// Staged-delete marker: the entry is slated for removal but stays
    /// enforced until the deletion is confirmed (re-authentication flow).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending_delete: bool,
}

impl BlockedWebsite {
    pub fn new(url: impl Into<String>, added_at: u64) -> Self {
        Self {
            url: url.into(),
            added_at,
            pending_delete: false,
        }
    }
}

/// A user-blocked channel, as stored under `blockedChannels`. Channels are
/// enforced page-side by name equality, never through the rule host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BlockedChannel {
    pub name: String,
    pub added_at: u64,
}

impl BlockedChannel {
    pub fn new(name: impl Into<String>, added_at: u64) -> Self {
        Self {
            name: name.into(),
            added_at,
        }
    }
}
