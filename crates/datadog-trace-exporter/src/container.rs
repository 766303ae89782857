// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Container id detection for the `Datadog-Container-ID` request header.
//!
//! The id is read from the cgroup file of the current process. Supported line
//! shapes, cgroup v1 and v2:
//! - `12:pids:/docker/<id>`
//! - `0::/system.slice/docker-<id>.scope`
//! - `0::/kubepods/besteffort/pod<uid>/<id>`
//! - `1:name=systemd:/ecs/<task>/<id>`

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

const CGROUP_PATH: &str = "/proc/self/cgroup";

lazy_static! {
    /// Docker ids are 64 hex characters, 12+ is accepted for short ids.
    static ref CONTAINER_ID_REGEXES: [Regex; 4] = [
        Regex::new(r"/docker/([0-9a-f]{12,})(?:/|$)").expect("failed creating regex"),
        Regex::new(r"docker-([0-9a-f]{12,})\.scope").expect("failed creating regex"),
        Regex::new(r"/kubepods/(?:[^/]+/)*([0-9a-f]{12,})$").expect("failed creating regex"),
        Regex::new(r"/ecs/[^/]+/([0-9a-f]{12,})(?:/|$)").expect("failed creating regex"),
    ];
    static ref CONTAINER_ID: Option<String> = read_container_id(CGROUP_PATH);
}

/// Container id of the current process, read once and cached.
#[must_use]
pub fn container_id() -> Option<&'static str> {
    CONTAINER_ID.as_deref()
}

fn read_container_id(path: &str) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let container_id = parse_container_id(&content);
            debug!("Detected container id: {container_id:?}");
            container_id
        }
        Err(e) => {
            trace!("Could not read cgroup file {path}: {e}");
            None
        }
    }
}

/// First container id found in cgroup file `content`.
#[must_use]
pub fn parse_container_id(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        CONTAINER_ID_REGEXES
            .iter()
            .find_map(|regex| regex.captures(line.trim()))
            .map(|captures| captures[1].to_string())
    })
}
