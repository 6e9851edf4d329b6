// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Which routines make up the connectivity groups for each kind of network.

use crate::{
    errors::NetworkTypeParseError,
    group::RoutineGroup,
    routine::{RoutineProperties, RoutineType},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The kind of network whose connectivity is being diagnosed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkType {
    /// A Wi-Fi network.
    #[default]
    Wifi,

    /// A wired network.
    Ethernet,

    /// A cellular network.
    Cellular,
}

impl NetworkType {
    /// All network types.
    pub const ALL: &'static [Self] = &[Self::Wifi, Self::Ethernet, Self::Cellular];

    /// The name of this network type, as used in config files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Ethernet => "ethernet",
            Self::Cellular => "cellular",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkType {
    type Err = NetworkTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|network| network.name() == s)
            .ok_or_else(|| NetworkTypeParseError::new(s))
    }
}

/// Label of the Wi-Fi group.
pub const WIFI_GROUP: &str = "Wi-Fi";
/// Label of the local network group.
pub const LOCAL_NETWORK_GROUP: &str = "Local network";
/// Label of the name resolution group.
pub const NAME_RESOLUTION_GROUP: &str = "Name resolution";
/// Label of the internet connectivity group.
pub const INTERNET_CONNECTIVITY_GROUP: &str = "Internet connectivity";

const WIFI_ROUTINES: &[(RoutineType, bool)] = &[
    (RoutineType::SignalStrength, false),
    (RoutineType::HasSecureWiFiConnection, false),
];

const LOCAL_NETWORK_ROUTINES: &[(RoutineType, bool)] = &[
    (RoutineType::GatewayCanBePinged, false),
    (RoutineType::LanConnectivity, true),
];

const NAME_RESOLUTION_ROUTINES: &[(RoutineType, bool)] = &[
    (RoutineType::DnsResolverPresent, true),
    (RoutineType::DnsResolution, true),
    (RoutineType::DnsLatency, false),
];

const INTERNET_CONNECTIVITY_ROUTINES: &[(RoutineType, bool)] = &[
    (RoutineType::CaptivePortal, false),
    (RoutineType::HttpFirewall, false),
    (RoutineType::HttpsFirewall, true),
    (RoutineType::HttpsLatency, false),
];

/// Returns the connectivity groups to run for `network`, in run order.
///
/// Every network gets the local network, name resolution and internet connectivity groups.
/// Wi-Fi networks get a Wi-Fi group in front of them.
pub fn routine_groups(network: NetworkType) -> Vec<RoutineGroup> {
    let mut groups = Vec::with_capacity(4);
    if network == NetworkType::Wifi {
        groups.push(make_group(WIFI_ROUTINES, WIFI_GROUP));
    }
    groups.push(make_group(LOCAL_NETWORK_ROUTINES, LOCAL_NETWORK_GROUP));
    groups.push(make_group(NAME_RESOLUTION_ROUTINES, NAME_RESOLUTION_GROUP));
    groups.push(make_group(
        INTERNET_CONNECTIVITY_ROUTINES,
        INTERNET_CONNECTIVITY_GROUP,
    ));
    groups
}

fn make_group(routines: &[(RoutineType, bool)], name: &str) -> RoutineGroup {
    RoutineGroup::new(
        routines
            .iter()
            .map(|&(routine, blocking)| RoutineProperties::new(routine, blocking)),
        name,
    )
}
