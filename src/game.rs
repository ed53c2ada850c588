#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownGame {
    pub app_id: u32,
    pub display_name: &'static str,
    /// Folder under the game's install dir that holds `maps/`.
    pub asset_subdir: &'static str,
}

pub const TEAM_FORTRESS_2: KnownGame = KnownGame {
    app_id: 440,
    display_name: "Team Fortress 2",
    asset_subdir: "tf",
};

/// Install folder Steam uses for Team Fortress 2 under `steamapps/common`.
pub const TEAM_FORTRESS_2_INSTALL_DIR: &str = "Team Fortress 2";

pub const SOURCE_GAMES: &[KnownGame] = &[
    KnownGame {
        app_id: 220,
        display_name: "Half-Life 2",
        asset_subdir: "hl2",
    },
    KnownGame {
        app_id: 240,
        display_name: "Counter-Strike: Source",
        asset_subdir: "cstrike",
    },
    KnownGame {
        app_id: 280,
        display_name: "Half-Life: Source",
        asset_subdir: "hl1",
    },
    KnownGame {
        app_id: 360,
        display_name: "Half-Life Deathmatch: Source",
        asset_subdir: "hl2mp",
    },
    KnownGame {
        app_id: 380,
        display_name: "Half-Life 2: Episode One",
        asset_subdir: "episodic",
    },
    KnownGame {
        app_id: 400,
        display_name: "Portal",
        asset_subdir: "portal",
    },
    KnownGame {
        app_id: 420,
        display_name: "Half-Life 2: Episode Two",
        asset_subdir: "ep2",
    },
    TEAM_FORTRESS_2,
    KnownGame {
        app_id: 500,
        display_name: "Left 4 Dead",
        asset_subdir: "left4dead",
    },
    KnownGame {
        app_id: 550,
        display_name: "Left 4 Dead 2",
        asset_subdir: "left4dead2",
    },
    KnownGame {
        app_id: 620,
        display_name: "Portal 2",
        asset_subdir: "portal2",
    },
    KnownGame {
        app_id: 730,
        display_name: "Counter-Strike: Global Offensive",
        asset_subdir: "csgo",
    },
];
