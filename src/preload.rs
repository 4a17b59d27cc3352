// Asset loading before the story starts.
use std::collections::HashMap;

use bevy::asset::{LoadState, UntypedAssetId};
use bevy::prelude::*;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::sound::{SoundKey, SoundSystem};
use crate::stages::Stage;

pub struct PreloadPlugin;

impl Plugin for PreloadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GameAssets>()
            .add_systems(PreStartup, load_assets)
            .add_systems(Update, finish_preload.run_if(in_state(Stage::Preload)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Texture {
    Jon,
    Bianca,
    JonWedding,
    JonProposalKnee,
    JonProposalStanding,
    BiancaProposal,
    BiancaWedding,
    Megabyte,
    MegabyteSitting,
    Kira,
    Box,
    House,
    Door,
    Altar,
    Potion,
}

impl Texture {
    pub fn asset_path(self) -> String {
        let name: &'static str = self.into();
        format!("sprites/{name}.png")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum Backdrop {
    #[strum(serialize = "scene-1-coronado")]
    Coronado,
    #[strum(serialize = "scene-2-house-moving-in")]
    MovingIn,
    #[strum(serialize = "scene-3-construction-before")]
    ConstructionBefore,
    #[strum(serialize = "scene-3-construction-after")]
    ConstructionAfter,
    #[strum(serialize = "scene-4-megabyte-joins")]
    MegabyteJoins,
    #[strum(serialize = "scene-5-health")]
    Health,
    #[strum(serialize = "scene-6-crossroad")]
    Crossroad,
    #[strum(serialize = "scene-7-home-life")]
    HomeLife,
    #[strum(serialize = "scene-8-wedding")]
    Wedding,
    #[strum(serialize = "scene-9-proposal")]
    Proposal,
}

impl Backdrop {
    pub fn asset_path(self) -> String {
        let name: &'static str = self.into();
        format!("backgrounds/{name}.png")
    }
}

#[derive(Resource, Debug, Default)]
pub struct GameAssets {
    textures: HashMap<Texture, Handle<Image>>,
    backdrops: HashMap<Backdrop, Handle<Image>>,
}

impl GameAssets {
    /// Falls back to the default image, which renders as a plain quad.
    pub fn texture(&self, texture: Texture) -> Handle<Image> {
        self.textures.get(&texture).cloned().unwrap_or_default()
    }

    pub fn backdrop(&self, backdrop: Backdrop) -> Handle<Image> {
        self.backdrops.get(&backdrop).cloned().unwrap_or_default()
    }
}

fn load_assets(
    asset_server: Res<AssetServer>,
    mut assets: ResMut<GameAssets>,
    mut sounds: ResMut<SoundSystem>,
) {
    for texture in Texture::iter() {
        assets
            .textures
            .insert(texture, asset_server.load(texture.asset_path()));
    }
    for backdrop in Backdrop::iter() {
        assets
            .backdrops
            .insert(backdrop, asset_server.load(backdrop.asset_path()));
    }
    for key in SoundKey::iter().filter(|key| key.is_shipped()) {
        sounds.register(key, asset_server.load(key.asset_path()));
    }
}

enum Progress {
    Pending,
    Ready,
    Failed,
}

fn progress(asset_server: &AssetServer, id: impl Into<UntypedAssetId>) -> Progress {
    let id = id.into();
    if asset_server.is_loaded_with_dependencies(id) {
        return Progress::Ready;
    }
    match asset_server.load_state(id) {
        LoadState::Failed(_) => Progress::Failed,
        _ => Progress::Pending,
    }
}

/// Waits until every asset has either loaded or failed, then starts the story.
fn finish_preload(
    asset_server: Res<AssetServer>,
    assets: Res<GameAssets>,
    mut sounds: ResMut<SoundSystem>,
    mut next_stage: ResMut<NextState<Stage>>,
) {
    let mut missing = Vec::new();
    let images = assets
        .textures
        .values()
        .chain(assets.backdrops.values())
        .map(|handle| (handle.path().map(|p| p.to_string()), handle.id().untyped()));
    let audio = SoundKey::iter()
        .filter_map(|key| sounds.handle(key).map(|handle| (key, handle)))
        .collect::<Vec<_>>();

    for (path, id) in images {
        match progress(&asset_server, id) {
            Progress::Pending => return,
            Progress::Failed => missing.push(path.unwrap_or_default()),
            Progress::Ready => {}
        }
    }
    let mut failed_cues = Vec::new();
    for (key, handle) in &audio {
        match progress(&asset_server, handle.id()) {
            Progress::Pending => return,
            Progress::Failed => failed_cues.push(*key),
            Progress::Ready => {}
        }
    }

    for path in missing {
        warn!("image failed to load: {path}");
    }
    for key in failed_cues {
        warn!("sound failed to load: {}", key.asset_path());
        sounds.unregister(key);
    }
    info!("assets ready");
    next_stage.set(Stage::Prologue);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_paths() {
        assert_eq!(Texture::JonProposalKnee.asset_path(), "sprites/jon-proposal-knee.png");
        assert_eq!(
            Backdrop::ConstructionAfter.asset_path(),
            "backgrounds/scene-3-construction-after.png"
        );
        assert_eq!(Backdrop::iter().count(), 10);
    }

    #[test]
    fn unloaded_lookups_fall_back() {
        let assets = GameAssets::default();
        assert_eq!(assets.texture(Texture::Kira), Handle::default());
    }
}
