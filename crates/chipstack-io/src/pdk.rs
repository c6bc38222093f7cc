//! Built-in process layer stacks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use chipstack_core::layer::LayerStack;

use crate::config::{parse_layer_stack, ConfigError};

/// A process design kit whose layer stack ships with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Pdk {
    #[default]
    IhpSg13g2,
}

impl Pdk {
    pub const ALL: &'static [Pdk] = &[Pdk::IhpSg13g2];

    /// Identifier used on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            Pdk::IhpSg13g2 => "ihp-sg13g2",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Pdk::IhpSg13g2 => "IHP Open PDK (SG13G2)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Pdk::IhpSg13g2 => "IHP SG13G2 130nm BiCMOS process",
        }
    }

    pub fn config_yaml(&self) -> &'static str {
        match self {
            Pdk::IhpSg13g2 => include_str!("../pdks/ihp-sg13g2.yaml"),
        }
    }

    pub fn layer_stack(&self) -> Result<LayerStack, ConfigError> {
        parse_layer_stack(self.config_yaml())
    }
}

impl fmt::Display for Pdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Pdk {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pdk::ALL
            .iter()
            .copied()
            .find(|p| p.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = Pdk::ALL.iter().map(Pdk::id).collect();
                format!("unknown PDK '{}', expected one of: {}", s, known.join(", "))
            })
    }
}
