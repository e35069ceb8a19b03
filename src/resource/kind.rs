//! Protocol resource kinds
//!
//! Closed set of IEEE 2030.5 / CSIP-Aus resource types the harness knows how
//! to discover and store. Where each kind sits in the resource tree lives in
//! [`crate::resource::graph`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// Identifies one protocol resource type
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    DeviceCapability,
    Time,
    MirrorUsagePointList,
    MirrorUsagePoint,
    MirrorMeterReadingList,
    MirrorMeterReading,
    EndDeviceList,
    EndDevice,
    ConnectionPoint,
    Registration,
    FunctionSetAssignmentsList,
    FunctionSetAssignments,
    DERProgramList,
    DERProgram,
    DefaultDERControl,
    DERControlList,
    DERControl,
    DERCurveList,
    DERCurve,
    DERList,
    DER,
    DERCapability,
    DERSettings,
    DERStatus,
    DERAvailability,
    SubscriptionList,
    Subscription,
    LogEventList,
    LogEvent,
}

impl ResourceKind {
    /// Every kind, in declaration order
    pub const ALL: [ResourceKind; 29] = [
        Self::DeviceCapability,
        Self::Time,
        Self::MirrorUsagePointList,
        Self::MirrorUsagePoint,
        Self::MirrorMeterReadingList,
        Self::MirrorMeterReading,
        Self::EndDeviceList,
        Self::EndDevice,
        Self::ConnectionPoint,
        Self::Registration,
        Self::FunctionSetAssignmentsList,
        Self::FunctionSetAssignments,
        Self::DERProgramList,
        Self::DERProgram,
        Self::DefaultDERControl,
        Self::DERControlList,
        Self::DERControl,
        Self::DERCurveList,
        Self::DERCurve,
        Self::DERList,
        Self::DER,
        Self::DERCapability,
        Self::DERSettings,
        Self::DERStatus,
        Self::DERAvailability,
        Self::SubscriptionList,
        Self::Subscription,
        Self::LogEventList,
        Self::LogEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceCapability => "DeviceCapability",
            Self::Time => "Time",
            Self::MirrorUsagePointList => "MirrorUsagePointList",
            Self::MirrorUsagePoint => "MirrorUsagePoint",
            Self::MirrorMeterReadingList => "MirrorMeterReadingList",
            Self::MirrorMeterReading => "MirrorMeterReading",
            Self::EndDeviceList => "EndDeviceList",
            Self::EndDevice => "EndDevice",
            Self::ConnectionPoint => "ConnectionPoint",
            Self::Registration => "Registration",
            Self::FunctionSetAssignmentsList => "FunctionSetAssignmentsList",
            Self::FunctionSetAssignments => "FunctionSetAssignments",
            Self::DERProgramList => "DERProgramList",
            Self::DERProgram => "DERProgram",
            Self::DefaultDERControl => "DefaultDERControl",
            Self::DERControlList => "DERControlList",
            Self::DERControl => "DERControl",
            Self::DERCurveList => "DERCurveList",
            Self::DERCurve => "DERCurve",
            Self::DERList => "DERList",
            Self::DER => "DER",
            Self::DERCapability => "DERCapability",
            Self::DERSettings => "DERSettings",
            Self::DERStatus => "DERStatus",
            Self::DERAvailability => "DERAvailability",
            Self::SubscriptionList => "SubscriptionList",
            Self::Subscription => "Subscription",
            Self::LogEventList => "LogEventList",
            Self::LogEvent => "LogEvent",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HarnessError::InvalidResourceKind(s.to_string()))
    }
}
