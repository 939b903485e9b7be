// src/joints.rs - Hand skeleton catalog
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const JOINT_COUNT: usize = 21;

/// One of the 21 hand joints. Discriminants follow the usual hand landmark
/// model ordering (wrist first, then thumb to little finger, base to tip).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HandJoint {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    LittleMcp = 17,
    LittlePip = 18,
    LittleDip = 19,
    LittleTip = 20,
}

impl HandJoint {
    pub const ALL: [HandJoint; JOINT_COUNT] = [
        HandJoint::Wrist,
        HandJoint::ThumbCmc,
        HandJoint::ThumbMp,
        HandJoint::ThumbIp,
        HandJoint::ThumbTip,
        HandJoint::IndexMcp,
        HandJoint::IndexPip,
        HandJoint::IndexDip,
        HandJoint::IndexTip,
        HandJoint::MiddleMcp,
        HandJoint::MiddlePip,
        HandJoint::MiddleDip,
        HandJoint::MiddleTip,
        HandJoint::RingMcp,
        HandJoint::RingPip,
        HandJoint::RingDip,
        HandJoint::RingTip,
        HandJoint::LittleMcp,
        HandJoint::LittlePip,
        HandJoint::LittleDip,
        HandJoint::LittleTip,
    ];

    pub const TIPS: [HandJoint; 5] = [
        HandJoint::ThumbTip,
        HandJoint::IndexTip,
        HandJoint::MiddleTip,
        HandJoint::RingTip,
        HandJoint::LittleTip,
    ];

    /// Joint whose depth anchors the stabilization of every other joint.
    pub const DEPTH_REFERENCE: HandJoint = HandJoint::MiddleMcp;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<HandJoint> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        CATALOG.names[self.index()]
    }

    /// Neighbour used to compute this joint's forward direction.
    pub fn orientation_target(self) -> HandJoint {
        CATALOG.orientation_targets[self.index()]
    }

    pub fn is_tip(self) -> bool {
        CATALOG.tips[self.index()]
    }

    /// Proximal neighbour, `None` for the wrist.
    pub fn parent(self) -> Option<HandJoint> {
        CATALOG.parents[self.index()]
    }

    pub fn children(self) -> &'static [HandJoint] {
        &CATALOG.children[self.index()]
    }
}

impl fmt::Display for HandJoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct JointCatalog {
    names: [&'static str; JOINT_COUNT],
    orientation_targets: [HandJoint; JOINT_COUNT],
    tips: [bool; JOINT_COUNT],
    parents: [Option<HandJoint>; JOINT_COUNT],
    children: Vec<Vec<HandJoint>>,
}

static CATALOG: Lazy<JointCatalog> = Lazy::new(JointCatalog::build);

impl JointCatalog {
    fn build() -> Self {
        use HandJoint::*;

        let names = [
            "wrist",
            "thumb_cmc",
            "thumb_mp",
            "thumb_ip",
            "thumb_tip",
            "index_mcp",
            "index_pip",
            "index_dip",
            "index_tip",
            "middle_mcp",
            "middle_pip",
            "middle_dip",
            "middle_tip",
            "ring_mcp",
            "ring_pip",
            "ring_dip",
            "ring_tip",
            "little_mcp",
            "little_pip",
            "little_dip",
            "little_tip",
        ];

        let mut orientation_targets = [Wrist; JOINT_COUNT];
        let mut tips = [false; JOINT_COUNT];
        let mut parents = [None; JOINT_COUNT];

        orientation_targets[Wrist.index()] = MiddleMcp;

        // Each finger is a proximal-to-distal chain of four joints.
        let fingers = [
            [ThumbCmc, ThumbMp, ThumbIp, ThumbTip],
            [IndexMcp, IndexPip, IndexDip, IndexTip],
            [MiddleMcp, MiddlePip, MiddleDip, MiddleTip],
            [RingMcp, RingPip, RingDip, RingTip],
            [LittleMcp, LittlePip, LittleDip, LittleTip],
        ];

        for chain in fingers {
            let [base, second, third, tip] = chain;

            parents[base.index()] = Some(Wrist);
            parents[second.index()] = Some(base);
            parents[third.index()] = Some(second);
            parents[tip.index()] = Some(third);

            orientation_targets[base.index()] = second;
            orientation_targets[second.index()] = third;
            orientation_targets[third.index()] = tip;
            // Tips have no child, so they look back at the joint below them.
            orientation_targets[tip.index()] = third;

            tips[tip.index()] = true;
        }

        let mut children = vec![Vec::new(); JOINT_COUNT];
        for joint in HandJoint::ALL {
            if let Some(parent) = parents[joint.index()] {
                children[parent.index()].push(joint);
            }
        }

        Self {
            names,
            orientation_targets,
            tips,
            parents,
            children,
        }
    }
}
