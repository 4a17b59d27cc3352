// Sound cues with replay dedup, loops and a master volume.
//
// `SoundSystem` only records intent. `apply_audio_requests` turns that into
// `AudioPlayer` entities, and `release_finished` notices when one-shots end.
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bevy::audio::Volume;
use bevy::prelude::*;
use strum::{EnumIter, IntoStaticStr};

pub struct SoundPlugin;

impl Plugin for SoundPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SoundSystem>().add_systems(
            PostUpdate,
            (release_finished, apply_audio_requests).chain(),
        );
    }
}

pub const MASTER_VOLUME: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SoundKey {
    DialogueAdvance,
    MessageAppear,
    HeartProgress,
    Footstep,
    MegabyteBark,
    MegabyteJoin,
    MegabyteAnxious,
    ItemCollect,
    Building,
    BowlFill,
    Door,
    BgPrologue,
    BgWedding,
    // No audio ships for these yet.
    FriendshipUnlock,
    BoxPush,
    BoxPlaced,
    ProposalYes,
    QuestFanfare,
    KoraArrive,
    KoraDepart,
    AltarReached,
}

impl SoundKey {
    pub fn is_shipped(self) -> bool {
        !matches!(
            self,
            SoundKey::FriendshipUnlock
                | SoundKey::BoxPush
                | SoundKey::BoxPlaced
                | SoundKey::ProposalYes
                | SoundKey::QuestFanfare
                | SoundKey::KoraArrive
                | SoundKey::KoraDepart
                | SoundKey::AltarReached
        )
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn asset_path(self) -> String {
        format!("audio/{}.mp3", self.name())
    }
}

/// Per-play overrides. Unset volume means the master volume.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CueOptions {
    pub volume: Option<f32>,
    pub seek: Option<Duration>,
}

impl CueOptions {
    pub fn at_volume(volume: f32) -> Self {
        Self {
            volume: Some(volume),
            seek: None,
        }
    }

    pub fn seek(mut self, position: Duration) -> Self {
        self.seek = Some(position);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioRequest {
    Start {
        key: SoundKey,
        volume: f32,
        looped: bool,
        seek: Option<Duration>,
    },
    Halt(Entity),
    Volume(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Voice {
    /// Requested this frame, not spawned yet.
    Queued,
    Playing(Entity),
}

/// Marks the entity playing a cue.
#[derive(Component, Debug)]
pub struct CueVoice(pub SoundKey);

#[derive(Resource, Debug)]
pub struct SoundSystem {
    cues: HashMap<SoundKey, Handle<AudioSource>>,
    voices: HashMap<SoundKey, Voice>,
    looping: HashSet<SoundKey>,
    requests: Vec<AudioRequest>,
    enabled: bool,
    master_volume: f32,
}

impl Default for SoundSystem {
    fn default() -> Self {
        Self {
            cues: HashMap::new(),
            voices: HashMap::new(),
            looping: HashSet::new(),
            requests: Vec::new(),
            enabled: true,
            master_volume: MASTER_VOLUME,
        }
    }
}

impl SoundSystem {
    pub fn register(&mut self, key: SoundKey, handle: Handle<AudioSource>) {
        self.cues.insert(key, handle);
    }

    pub fn unregister(&mut self, key: SoundKey) {
        self.cues.remove(&key);
    }

    pub fn handle(&self, key: SoundKey) -> Option<Handle<AudioSource>> {
        self.cues.get(&key).cloned()
    }

    pub fn play(&mut self, key: SoundKey, options: CueOptions) {
        self.start(key, options, false);
    }

    /// Starts a looping cue unless it is already looping.
    pub fn play_loop(&mut self, key: SoundKey, options: CueOptions) {
        if !self.looping.insert(key) {
            return;
        }
        self.start(key, options, true);
    }

    fn start(&mut self, key: SoundKey, options: CueOptions, looped: bool) {
        if !self.enabled {
            return;
        }
        if !self.cues.contains_key(&key) {
            warn!("sound not found: {}", key.name());
            return;
        }
        if self.is_playing(key) {
            if !looped {
                return;
            }
            self.halt(key);
        }
        self.requests.push(AudioRequest::Start {
            key,
            volume: options.volume.unwrap_or(self.master_volume),
            looped,
            seek: options.seek,
        });
        self.voices.insert(key, Voice::Queued);
    }

    fn halt(&mut self, key: SoundKey) {
        match self.voices.remove(&key) {
            Some(Voice::Playing(entity)) => self.requests.push(AudioRequest::Halt(entity)),
            Some(Voice::Queued) => self
                .requests
                .retain(|request| !matches!(request, AudioRequest::Start { key: k, .. } if *k == key)),
            None => {}
        }
    }

    pub fn stop(&mut self, key: SoundKey) {
        self.halt(key);
        self.looping.remove(&key);
    }

    pub fn stop_all(&mut self) {
        let keys: Vec<SoundKey> = self.voices.keys().copied().collect();
        for key in keys {
            self.halt(key);
        }
        self.looping.clear();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        self.requests.push(AudioRequest::Volume(self.master_volume));
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.stop_all();
        }
    }

    pub fn is_playing(&self, key: SoundKey) -> bool {
        self.voices.contains_key(&key)
    }

    pub fn take_requests(&mut self) -> Vec<AudioRequest> {
        std::mem::take(&mut self.requests)
    }

    fn bind(&mut self, key: SoundKey, entity: Entity) {
        self.voices.insert(key, Voice::Playing(entity));
    }

    /// Forgets voices whose entity is gone.
    fn release(&mut self, alive: impl Fn(Entity) -> bool) {
        self.voices.retain(|key, voice| match voice {
            Voice::Playing(entity) if !alive(*entity) => {
                debug!("sound finished: {}", key.name());
                false
            }
            _ => true,
        });
    }
}

fn release_finished(mut sounds: ResMut<SoundSystem>, voices: Query<(), With<CueVoice>>) {
    sounds.release(|entity| voices.contains(entity));
}

fn apply_audio_requests(
    mut commands: Commands,
    mut sounds: ResMut<SoundSystem>,
    voices: Query<(), With<CueVoice>>,
    mut sinks: Query<&mut AudioSink, With<CueVoice>>,
) {
    for request in sounds.take_requests() {
        match request {
            AudioRequest::Start {
                key,
                volume,
                looped,
                seek,
            } => {
                let Some(handle) = sounds.handle(key) else {
                    continue;
                };
                let mut settings = if looped {
                    PlaybackSettings::LOOP
                } else {
                    PlaybackSettings::DESPAWN
                };
                settings.volume = Volume::Linear(volume);
                settings.start_position = seek;
                let entity = commands
                    .spawn((CueVoice(key), AudioPlayer::new(handle), settings))
                    .id();
                sounds.bind(key, entity);
            }
            AudioRequest::Halt(entity) => {
                if voices.contains(entity) {
                    commands.entity(entity).despawn();
                }
            }
            AudioRequest::Volume(volume) => {
                for mut sink in &mut sinks {
                    sink.set_volume(Volume::Linear(volume));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn loaded() -> SoundSystem {
        let mut sounds = SoundSystem::default();
        for key in SoundKey::iter().filter(|key| key.is_shipped()) {
            sounds.register(key, Handle::default());
        }
        sounds
    }

    fn starts(requests: &[AudioRequest]) -> usize {
        requests
            .iter()
            .filter(|request| matches!(request, AudioRequest::Start { .. }))
            .count()
    }

    #[test]
    fn key_table() {
        assert_eq!(SoundKey::iter().count(), 21);
        assert_eq!(SoundKey::iter().filter(|key| key.is_shipped()).count(), 13);
        assert_eq!(SoundKey::DialogueAdvance.asset_path(), "audio/dialogue-advance.mp3");
        assert_eq!(SoundKey::BgWedding.name(), "bg-wedding");
    }

    #[test]
    fn playing_cue_is_not_restarted() {
        let mut sounds = loaded();
        sounds.play(SoundKey::Door, CueOptions::default());
        sounds.play(SoundKey::Door, CueOptions::default());
        let requests = sounds.take_requests();
        assert_eq!(starts(&requests), 1);
        assert!(sounds.is_playing(SoundKey::Door));

        // Once the voice ends the cue can play again.
        sounds.bind(SoundKey::Door, Entity::PLACEHOLDER);
        sounds.release(|_| false);
        assert!(!sounds.is_playing(SoundKey::Door));
        sounds.play(SoundKey::Door, CueOptions::default());
        assert_eq!(starts(&sounds.take_requests()), 1);
    }

    #[test]
    fn start_uses_master_volume_unless_overridden() {
        let mut sounds = loaded();
        sounds.play(SoundKey::Footstep, CueOptions::at_volume(0.3));
        sounds.play(SoundKey::Door, CueOptions::default());
        let requests = sounds.take_requests();
        assert!(requests.contains(&AudioRequest::Start {
            key: SoundKey::Footstep,
            volume: 0.3,
            looped: false,
            seek: None,
        }));
        assert!(requests.contains(&AudioRequest::Start {
            key: SoundKey::Door,
            volume: MASTER_VOLUME,
            looped: false,
            seek: None,
        }));
    }

    #[test]
    fn loop_starts_once() {
        let mut sounds = loaded();
        sounds.play_loop(SoundKey::BgPrologue, CueOptions::default());
        sounds.play_loop(SoundKey::BgPrologue, CueOptions::default());
        assert_eq!(starts(&sounds.take_requests()), 1);

        sounds.stop(SoundKey::BgPrologue);
        sounds.play_loop(SoundKey::BgPrologue, CueOptions::default());
        assert_eq!(starts(&sounds.take_requests()), 1);
    }

    #[test]
    fn unknown_cue_is_ignored() {
        let mut sounds = loaded();
        sounds.play(SoundKey::QuestFanfare, CueOptions::default());
        assert!(sounds.take_requests().is_empty());
        assert!(!sounds.is_playing(SoundKey::QuestFanfare));
    }

    #[test]
    fn disabled_plays_nothing() {
        let mut sounds = loaded();
        sounds.set_enabled(false);
        sounds.play(SoundKey::Door, CueOptions::default());
        assert!(sounds.take_requests().is_empty());
    }

    #[test]
    fn volume_is_clamped() {
        let mut sounds = loaded();
        sounds.set_volume(2.0);
        assert_eq!(sounds.master_volume(), 1.0);
        sounds.set_volume(-1.0);
        assert_eq!(sounds.master_volume(), 0.0);
        assert_eq!(
            sounds.take_requests(),
            vec![AudioRequest::Volume(1.0), AudioRequest::Volume(0.0)]
        );
    }

    #[test]
    fn stop_all_halts_live_and_cancels_queued() {
        let mut sounds = loaded();
        sounds.play(SoundKey::Building, CueOptions::default());
        sounds.take_requests();
        sounds.bind(SoundKey::Building, Entity::PLACEHOLDER);
        sounds.play(SoundKey::Door, CueOptions::default());

        sounds.stop_all();
        assert!(!sounds.is_playing(SoundKey::Building));
        assert!(!sounds.is_playing(SoundKey::Door));
        assert_eq!(
            sounds.take_requests(),
            vec![AudioRequest::Halt(Entity::PLACEHOLDER)]
        );
    }

    #[test]
    fn requests_spawn_and_release_voices() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins).add_plugins(SoundPlugin);
        app.world_mut().insert_resource(loaded());
        app.world_mut()
            .resource_mut::<SoundSystem>()
            .play(SoundKey::Door, CueOptions::default());
        app.update();

        let mut voices = app.world_mut().query_filtered::<Entity, With<CueVoice>>();
        let spawned: Vec<Entity> = voices.iter(app.world()).collect();
        assert_eq!(spawned.len(), 1);
        assert!(app.world().resource::<SoundSystem>().is_playing(SoundKey::Door));

        app.world_mut().despawn(spawned[0]);
        app.update();
        assert!(!app.world().resource::<SoundSystem>().is_playing(SoundKey::Door));
    }
}
