//! Signal catalogue
//!
//! Names of the decoded bus signals the reactor understands, and how the
//! proximity and cross-traffic signals map onto positional channels.

use crate::types::Channel;

/// Idle marker, always accepted, drives the grace-period check
pub const NO_OP: &str = "NoOp";
pub const HU_VOLUME_STATUS: &str = "HU_VolumeStatus";
pub const HU_VEHICLE_POWER: &str = "HU_VehiclePwr";
pub const HU_MUTE_STATUS: &str = "HU_MuteStatus";
pub const REVERSE: &str = "C_InhibitR";
pub const BEEP: &str = "AMP_DefaultBeep1";

pub const MUTE_OFF: i64 = 0;
pub const REVERSE_ENGAGED: i64 = 1;
pub const BEEP_REQUESTED: i64 = 1;

/// Parking-proximity speaker alarm, one per sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    FrontLeft,
    FrontRight,
    FrontCenter,
    RearLeft,
    RearRight,
    RearCenter,
}

impl Sensor {
    /// Evaluation order within a single update
    pub const ALL: [Sensor; 6] = [
        Sensor::FrontLeft,
        Sensor::FrontRight,
        Sensor::FrontCenter,
        Sensor::RearLeft,
        Sensor::RearRight,
        Sensor::RearCenter,
    ];

    pub fn signal_name(&self) -> &'static str {
        match self {
            Sensor::FrontLeft => "Pas_Spkr_Flh_Alarm",
            Sensor::FrontRight => "Pas_Spkr_Frh_Alarm",
            Sensor::FrontCenter => "Pas_Spkr_Fcnt_Alarm",
            Sensor::RearLeft => "Pas_Spkr_Rlh_Alarm",
            Sensor::RearRight => "Pas_Spkr_Rrh_Alarm",
            Sensor::RearCenter => "Pas_Spkr_Rcnt_Alarm",
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Sensor::FrontLeft | Sensor::RearLeft => Channel::Left,
            Sensor::FrontRight | Sensor::RearRight => Channel::Right,
            Sensor::FrontCenter | Sensor::RearCenter => Channel::Center,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Sensor::FrontLeft => 0,
            Sensor::FrontRight => 1,
            Sensor::FrontCenter => 2,
            Sensor::RearLeft => 3,
            Sensor::RearRight => 4,
            Sensor::RearCenter => 5,
        }
    }
}

/// Cross-traffic sound warning, front and rear on each side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficSignal {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl TrafficSignal {
    pub const ALL: [TrafficSignal; 4] = [
        TrafficSignal::FrontLeft,
        TrafficSignal::FrontRight,
        TrafficSignal::RearLeft,
        TrafficSignal::RearRight,
    ];

    pub fn signal_name(&self) -> &'static str {
        match self {
            TrafficSignal::FrontLeft => "FL_SndWarn",
            TrafficSignal::FrontRight => "FR_SndWarn",
            TrafficSignal::RearLeft => "RL_SndWarn",
            TrafficSignal::RearRight => "RR_SndWarn",
        }
    }

    /// Traffic warnings only ever target a side, never the center
    pub fn channel(&self) -> Channel {
        match self {
            TrafficSignal::FrontLeft | TrafficSignal::RearLeft => Channel::Left,
            TrafficSignal::FrontRight | TrafficSignal::RearRight => Channel::Right,
        }
    }
}
