// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routine identifiers and results.
//!
//! A routine is a single named self-test run against device hardware. The main
//! types here are [`RoutineType`] and [`RoutineResult`].

use crate::errors::{MalformedRoutineResultError, RoutineTypeParseError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

macro_rules! routine_types {
    ($($variant:ident => $name:literal, $description:literal;)*) => {
        /// A specific diagnostic routine.
        ///
        /// This is a closed set: controllers can only be asked to run routines listed here.
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub enum RoutineType {
            $(
                #[doc = $description]
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl RoutineType {
            /// All routine types, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),*];

            /// Returns the string names of all routine types, in declaration order.
            pub fn variants() -> &'static [&'static str] {
                &[$($name),*]
            }

            /// Returns the kebab-case name of this routine, as used in config files and on the
            /// command line.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            /// Returns a short human-readable description of this routine.
            pub fn description(self) -> &'static str {
                match self {
                    $(Self::$variant => $description,)*
                }
            }
        }

        impl FromStr for RoutineType {
            type Err = RoutineTypeParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)*
                    other => Err(RoutineTypeParseError::new(other)),
                }
            }
        }
    };
}

routine_types! {
    BatteryCharge => "battery-charge", "Battery charge";
    BatteryDischarge => "battery-discharge", "Battery discharge";
    CpuStress => "cpu-stress", "CPU stress";
    CpuCache => "cpu-cache", "CPU cache";
    CpuFloatingPoint => "cpu-floating-point", "CPU floating point accuracy";
    CpuPrime => "cpu-prime", "CPU prime search";
    Memory => "memory", "Memory";
    LanConnectivity => "lan-connectivity", "LAN connectivity";
    SignalStrength => "signal-strength", "Signal strength";
    GatewayCanBePinged => "gateway-can-be-pinged", "Gateway can be pinged";
    HasSecureWiFiConnection => "has-secure-wifi-connection", "Secure Wi-Fi connection";
    DnsResolverPresent => "dns-resolver-present", "DNS resolver present";
    DnsLatency => "dns-latency", "DNS latency";
    DnsResolution => "dns-resolution", "DNS resolution";
    CaptivePortal => "captive-portal", "Captive portal";
    HttpFirewall => "http-firewall", "HTTP firewall";
    HttpsFirewall => "https-firewall", "HTTPS firewall";
    HttpsLatency => "https-latency", "HTTPS latency";
    ArcHttp => "arc-http", "ARC HTTP";
    ArcPing => "arc-ping", "ARC ping";
    ArcDnsResolution => "arc-dns-resolution", "ARC DNS resolution";
}

impl RoutineType {
    /// Returns true if this routine measures the battery.
    ///
    /// Power routines report a [`PowerRoutineResult`], and sections made up of them use the
    /// power routine runtime for their estimate.
    pub fn is_power_routine(self) -> bool {
        matches!(self, Self::BatteryCharge | Self::BatteryDischarge)
    }
}

impl fmt::Display for RoutineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// The outcome of a routine, independent of what kind of routine it was.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StandardRoutineResult {
    /// The routine ran and the hardware passed.
    Passed,

    /// The routine ran and the hardware failed.
    Failed,

    /// The routine could not complete because of an error while executing it.
    ExecutionError,

    /// The routine is unsupported on this device, or could not be run.
    UnableToRun,
}

impl StandardRoutineResult {
    /// Returns a short uppercase label for this result.
    pub fn label(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::ExecutionError => "ERROR",
            Self::UnableToRun => "UNABLE TO RUN",
        }
    }
}

impl fmt::Display for StandardRoutineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::ExecutionError => write!(f, "execution error"),
            Self::UnableToRun => write!(f, "unable to run"),
        }
    }
}

/// The result of a battery routine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PowerRoutineResult {
    /// The overall outcome.
    pub simple_result: StandardRoutineResult,

    /// Whether the device was charging while the routine ran.
    pub is_charging: bool,

    /// Change in charge percentage over the routine, negative when discharging.
    pub percent_delta: i32,

    /// How long the measurement took, in seconds.
    pub time_delta_seconds: i64,
}

/// The final result of a routine.
///
/// Exactly one variant is present; see [`RawRoutineResult`] for the boundary representation
/// where that isn't guaranteed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RoutineResult {
    /// A routine that reports only a standard result.
    #[serde(rename = "simple-result")]
    Simple(StandardRoutineResult),

    /// A battery routine.
    #[serde(rename = "power-result")]
    Power(PowerRoutineResult),
}

impl RoutineResult {
    /// Returns the standard outcome of this result, whichever variant it is.
    pub fn simple_result(&self) -> StandardRoutineResult {
        match self {
            Self::Simple(result) => *result,
            Self::Power(power) => power.simple_result,
        }
    }

    /// Returns true if this result counts as a failure for aggregation purposes.
    ///
    /// Anything other than [`StandardRoutineResult::Passed`] is a failure.
    pub fn is_failure(&self) -> bool {
        self.simple_result() != StandardRoutineResult::Passed
    }

    /// Returns the power result, if this is one.
    pub fn power_result(&self) -> Option<&PowerRoutineResult> {
        match self {
            Self::Simple(_) => None,
            Self::Power(power) => Some(power),
        }
    }
}

impl From<StandardRoutineResult> for RoutineResult {
    fn from(result: StandardRoutineResult) -> Self {
        Self::Simple(result)
    }
}

impl From<PowerRoutineResult> for RoutineResult {
    fn from(result: PowerRoutineResult) -> Self {
        Self::Power(result)
    }
}

/// A routine result as reported across the controller boundary.
///
/// The service describes results as a record with two optional fields. This
/// type carries that shape until it's validated into a [`RoutineResult`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawRoutineResult {
    /// The standard result, if this is a simple routine.
    #[serde(default)]
    pub simple_result: Option<StandardRoutineResult>,

    /// The power result, if this is a battery routine.
    #[serde(default)]
    pub power_result: Option<PowerRoutineResult>,
}

impl From<RoutineResult> for RawRoutineResult {
    fn from(result: RoutineResult) -> Self {
        match result {
            RoutineResult::Simple(simple) => Self {
                simple_result: Some(simple),
                power_result: None,
            },
            RoutineResult::Power(power) => Self {
                simple_result: None,
                power_result: Some(power),
            },
        }
    }
}

impl TryFrom<RawRoutineResult> for RoutineResult {
    type Error = MalformedRoutineResultError;

    fn try_from(raw: RawRoutineResult) -> Result<Self, Self::Error> {
        match (raw.simple_result, raw.power_result) {
            (Some(simple), None) => Ok(Self::Simple(simple)),
            (None, Some(power)) => Ok(Self::Power(power)),
            (Some(_), Some(_)) => Err(MalformedRoutineResultError::BothPresent),
            (None, None) => Err(MalformedRoutineResultError::NonePresent),
        }
    }
}

/// A routine together with whether its failure blocks the routines after it.
///
/// Used to build [`RoutineGroup`](crate::group::RoutineGroup)s.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoutineProperties {
    /// The routine.
    pub routine: RoutineType,

    /// Whether a failure of this routine should stop the routines that follow.
    #[serde(default = "default_blocking")]
    pub blocking: bool,
}

fn default_blocking() -> bool {
    true
}

impl RoutineProperties {
    /// Creates a new `RoutineProperties`.
    pub fn new(routine: RoutineType, blocking: bool) -> Self {
        Self { routine, blocking }
    }

    /// Returns true if a failure of this routine does not stop sibling routines.
    pub fn is_non_blocking(&self) -> bool {
        !self.blocking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn names_round_trip() {
        for &routine in RoutineType::ALL {
            assert_eq!(
                routine.name().parse::<RoutineType>().unwrap(),
                routine,
                "for routine {routine:?}"
            );
        }
        assert_eq!(RoutineType::ALL.len(), RoutineType::variants().len());
    }

    #[test]
    fn unknown_name_lists_known_routines() {
        let err = "cpu-turbo".parse::<RoutineType>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cpu-turbo"), "{message}");
        assert!(message.contains("cpu-stress"), "{message}");
    }

    #[test_case(RoutineType::BatteryCharge, true; "battery charge")]
    #[test_case(RoutineType::BatteryDischarge, true; "battery discharge")]
    #[test_case(RoutineType::CpuStress, false; "cpu stress")]
    #[test_case(RoutineType::SignalStrength, false; "signal strength")]
    fn power_routines(routine: RoutineType, expected: bool) {
        assert_eq!(routine.is_power_routine(), expected);
    }

    #[test_case(StandardRoutineResult::Passed, false)]
    #[test_case(StandardRoutineResult::Failed, true)]
    #[test_case(StandardRoutineResult::ExecutionError, true)]
    #[test_case(StandardRoutineResult::UnableToRun, true)]
    fn failure_classification(simple: StandardRoutineResult, is_failure: bool) {
        assert_eq!(RoutineResult::Simple(simple).is_failure(), is_failure);

        let power = RoutineResult::Power(PowerRoutineResult {
            simple_result: simple,
            is_charging: true,
            percent_delta: 5,
            time_delta_seconds: 30,
        });
        assert_eq!(power.is_failure(), is_failure);
    }

    #[test]
    fn raw_result_requires_exactly_one_variant() {
        let power = PowerRoutineResult {
            simple_result: StandardRoutineResult::Passed,
            is_charging: false,
            percent_delta: -3,
            time_delta_seconds: 60,
        };

        let both = RawRoutineResult {
            simple_result: Some(StandardRoutineResult::Passed),
            power_result: Some(power),
        };
        assert_eq!(
            RoutineResult::try_from(both),
            Err(MalformedRoutineResultError::BothPresent)
        );
        assert_eq!(
            RoutineResult::try_from(RawRoutineResult::default()),
            Err(MalformedRoutineResultError::NonePresent)
        );

        let only_power = RawRoutineResult {
            simple_result: None,
            power_result: Some(power),
        };
        assert_eq!(
            RoutineResult::try_from(only_power),
            Ok(RoutineResult::Power(power))
        );
    }

    #[test]
    fn result_serialization() {
        let json = serde_json::to_string(&RoutineResult::Simple(StandardRoutineResult::Failed))
            .unwrap();
        assert_eq!(json, r#"{"simple-result":"failed"}"#);

        let raw: RawRoutineResult =
            serde_json::from_str(r#"{"simple-result":"execution-error"}"#).unwrap();
        assert_eq!(
            RoutineResult::try_from(raw),
            Ok(RoutineResult::Simple(StandardRoutineResult::ExecutionError))
        );
    }
}
