//! World and player context sampled once per frame.

/// Read-only view of the loaded world.
pub trait WorldQuery {
    /// Name of the active scene, `None` while no scene is loaded.
    fn active_scene(&self) -> Option<&str>;
    /// Whether the world's sun light exists, i.e. the world finished loading.
    fn has_world_sun(&self) -> bool;
}

/// Read-only view of the local player.
pub trait PlayerQuery {
    /// The helmet the player wears, if any.
    fn headgear(&self) -> Option<HeadgearState>;
}

/// A worn helmet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadgearState {
    pub id: String,
    pub closed: bool,
}

/// Menu and splash scenes are never part of the world.
pub fn is_menu_scene(name: &str) -> bool {
    let name = name.to_lowercase();
    name.contains("menu") || name.contains("splash")
}

/// Everything the effects need to know about the world this frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldContext {
    pub in_world: bool,
    /// Identifier of the worn helmet, only reported while it is closed.
    pub worn_headgear_id: Option<String>,
    pub headgear_closed: bool,
}

impl WorldContext {
    pub fn evaluate(world: &dyn WorldQuery, player: Option<&dyn PlayerQuery>) -> Self {
        let in_world = world
            .active_scene()
            .is_some_and(|scene| !is_menu_scene(scene))
            && world.has_world_sun();
        if !in_world {
            return Self::default();
        }

        match player.and_then(|p| p.headgear()) {
            Some(HeadgearState { id, closed: true }) => Self {
                in_world,
                worn_headgear_id: Some(id),
                headgear_closed: true,
            },
            _ => Self {
                in_world,
                ..Default::default()
            },
        }
    }

    /// The `(closed, id)` pair the coordinator reacts to.
    pub fn headgear_key(&self) -> (bool, &str) {
        (
            self.headgear_closed,
            self.worn_headgear_id.as_deref().unwrap_or(""),
        )
    }
}

/// Fixed world state, for hosts that track the scene themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneState {
    pub scene: Option<String>,
    pub sun: bool,
}

impl SceneState {
    pub fn loaded(scene: &str) -> Self {
        Self {
            scene: Some(scene.to_string()),
            sun: true,
        }
    }
}

impl WorldQuery for SceneState {
    fn active_scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    fn has_world_sun(&self) -> bool {
        self.sun
    }
}

/// Fixed player state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerState {
    pub headgear: Option<HeadgearState>,
}

impl PlayerState {
    pub fn wearing(id: &str, closed: bool) -> Self {
        Self {
            headgear: Some(HeadgearState {
                id: id.to_string(),
                closed,
            }),
        }
    }
}

impl PlayerQuery for PlayerState {
    fn headgear(&self) -> Option<HeadgearState> {
        self.headgear.clone()
    }
}
