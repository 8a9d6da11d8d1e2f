use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// GraphQL endpoint serving policy objects
pub const POLICY_ENDPOINT: &str = "/app/i2/graphql/V1";
/// GraphQL endpoint serving WAF objects
pub const WAF_ENDPOINT: &str = "/app/waf/graphql/V1";
/// GraphQL endpoint of the development gateway
pub const DEV_ENDPOINT: &str = "/app/infinity2gem/graphql/V1";

const EU_HOST: &str = "https://cloudinfra-gw.portal.checkpoint.com";
const US_HOST: &str = "https://cloudinfra-gw-us.portal.checkpoint.com";
const DEV_HOST: &str = "https://dev-cloudinfra-gw.kube1.iaas.checkpoint.com";

/// Infinity Portal gateway region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Europe (default)
    #[default]
    Eu,
    /// United States
    Us,
    /// Development gateway
    Dev,
    /// Pre-production: development gateway, production endpoint
    Preprod,
}

impl Region {
    /// All supported regions
    pub const ALL: [Self; 4] = [Self::Eu, Self::Us, Self::Dev, Self::Preprod];

    /// Gateway host for this region
    pub const fn host(self) -> &'static str {
        match self {
            Self::Eu => EU_HOST,
            Self::Us => US_HOST,
            Self::Dev | Self::Preprod => DEV_HOST,
        }
    }

    /// Default GraphQL endpoint path for this region, before token based selection
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Dev => DEV_ENDPOINT,
            Self::Eu | Self::Us | Self::Preprod => POLICY_ENDPOINT,
        }
    }

    /// Lower-case name as accepted on the command line
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eu => "eu",
            Self::Us => "us",
            Self::Dev => "dev",
            Self::Preprod => "preprod",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|region| region.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid region {s}, expected one of eu, us, dev, preprod"))
    }
}
