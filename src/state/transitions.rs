//! Pure session transitions.
//!
//! Every mutating operation is a function of the current document that
//! either produces a new document, declares a benign no-op or aborts. None of
//! them captures outer mutable state, so the runner can recompute them from a
//! fresh read as often as the store reports a conflict.

use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;

use crate::{
    config::DEFAULT_PALETTE,
    state::{
        ledger,
        normalizer::{count_words, normalize_segment},
        scheduler::{self, MIN_ACTIVE_PLAYERS, Schedule},
        session::{
            MAX_PLAYER_NAME_CHARS, Player, PlayerId, SegmentAuthor, SegmentId, SegmentMetadata,
            Session, Settings, StorySegment, TurnClock, check_player_id,
        },
        state_machine::{InvalidTransition, PauseReason, SessionEvent, SessionStatus},
    },
};

/// Color handed out when the configured palette is empty.
const FALLBACK_COLOR: &str = "#9E9E9E";

/// Room-wide rules that do not live in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRules {
    /// Colors assigned to players in join order.
    pub palette: Vec<String>,
    /// Maximum number of simultaneously active players.
    pub max_players: usize,
    /// Maximum length of a submission, in characters.
    pub max_submission_chars: usize,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|color| color.to_string()).collect(),
            max_players: 10,
            max_submission_chars: 120,
        }
    }
}

impl SessionRules {
    /// First palette color no known player holds, cycling once the palette is exhausted.
    pub fn assign_color(&self, session: &Session) -> String {
        if self.palette.is_empty() {
            return FALLBACK_COLOR.to_string();
        }

        self.palette
            .iter()
            .find(|color| {
                !session
                    .players
                    .values()
                    .any(|player| player.color.eq_ignore_ascii_case(color))
            })
            .cloned()
            .unwrap_or_else(|| self.palette[session.players.len() % self.palette.len()].clone())
    }
}

/// Inputs shared by every transition besides the document itself.
///
/// A fresh context is built for each attempt so `now` always reflects the
/// moment the transition is computed.
pub struct TransitionContext<'a> {
    /// Wall-clock milliseconds of this attempt.
    pub now: u64,
    /// Room-wide rules.
    pub rules: &'a SessionRules,
    /// Randomness for shuffles, bag insertions and identifiers.
    pub rng: StdRng,
}

impl<'a> TransitionContext<'a> {
    /// Context seeded from the operating system.
    pub fn new(now: u64, rules: &'a SessionRules) -> Self {
        Self {
            now,
            rules,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic context, used by tests and simulations.
    pub fn seeded(now: u64, rules: &'a SessionRules, seed: u64) -> Self {
        Self {
            now,
            rules,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Random identifier for players and segments.
    pub fn new_id(&mut self) -> String {
        uuid::Builder::from_random_bytes(self.rng.random())
            .into_uuid()
            .to_string()
    }
}

/// Result of a transition that did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Write the new document and hand `T` back to the caller.
    Commit(Session, T),
    /// Write the new document without publishing it; bookkeeping only.
    Quiet(Session, T),
    /// Nothing to write; the call still succeeds with `T`.
    NoOp(T),
}

/// Reasons a transition refuses to produce a new document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The lifecycle does not allow the operation from the current status.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Too few active players to run turns.
    #[error("at least {MIN_ACTIVE_PLAYERS} active players are required (got {active})")]
    NotEnoughPlayers {
        /// Active players at the time of the attempt.
        active: usize,
    },
    /// No room for another active player.
    #[error("room is full ({max} active players)")]
    RoomFull {
        /// Configured capacity.
        max: usize,
    },
    /// The session is over and accepts no new players.
    #[error("session has ended")]
    SessionEnded,
    /// Unknown player id.
    #[error("player `{0}` not found")]
    PlayerNotFound(PlayerId),
    /// Unknown segment id.
    #[error("story segment `{0}` not found")]
    SegmentNotFound(SegmentId),
    /// Rejected input.
    #[error("{0}")]
    InvalidInput(String),
    /// Host-only operation without the host token.
    #[error("host token is missing or invalid")]
    Unauthorized,
}

/// Abort unless `token` is the host token of `session`.
pub fn ensure_host(session: &Session, token: &str) -> Result<(), TransitionError> {
    if session.is_host(token) {
        Ok(())
    } else {
        Err(TransitionError::Unauthorized)
    }
}

fn commit<T>(mut session: Session, ctx: &TransitionContext<'_>, value: T) -> Outcome<T> {
    session.updated_at = ctx.now;
    session.version += 1;
    Outcome::Commit(session, value)
}

/// Hand the turn to the next scheduled player, or pause when the quorum is lost.
///
/// Returns `false` when the session paused instead of advancing.
fn advance_turn(session: &mut Session, ctx: &mut TransitionContext<'_>) -> Result<bool, TransitionError> {
    let active = session.active_player_ids();
    match scheduler::next_turn(
        &session.turn_bag,
        session.last_player_id.as_deref(),
        &active,
        &mut ctx.rng,
    ) {
        Schedule::Next { player_id, bag } => {
            session.current_player_id = Some(player_id);
            session.turn_bag = bag;
            session.turn = Some(TurnClock::start(ctx.now, &session.settings));
            Ok(true)
        }
        Schedule::Pause => {
            halt_turn(session, SessionEvent::Pause(PauseReason::NotEnoughPlayers))?;
            Ok(false)
        }
    }
}

/// Apply a status change that stops the running turn.
fn halt_turn(session: &mut Session, event: SessionEvent) -> Result<(), TransitionError> {
    session.status = session.status.next(event)?;
    session.current_player_id = None;
    session.turn = None;
    Ok(())
}

/// Pause a playing session that no longer has enough active players.
fn enforce_quorum(session: &mut Session) -> Result<bool, TransitionError> {
    if session.status == SessionStatus::Playing && session.active_count() < MIN_ACTIVE_PLAYERS {
        halt_turn(session, SessionEvent::Pause(PauseReason::NotEnoughPlayers))?;
        return Ok(true);
    }
    Ok(false)
}

/// Leave the lobby: shuffle the active players and start the first turn.
pub fn start(session: &Session, ctx: &mut TransitionContext<'_>) -> Result<Outcome<()>, TransitionError> {
    let status = session.status.next(SessionEvent::Start)?;
    let active = session.active_player_ids();
    if active.len() < MIN_ACTIVE_PLAYERS {
        return Err(TransitionError::NotEnoughPlayers {
            active: active.len(),
        });
    }

    let mut next = session.clone();
    let mut order = scheduler::initial_order(&active, &mut ctx.rng);
    let first = order.remove(0);
    next.status = status;
    next.current_player_id = Some(first);
    next.turn_bag = order;
    next.last_player_id = None;
    next.turn = Some(TurnClock::start(ctx.now, &next.settings));

    Ok(commit(next, ctx, ()))
}

/// Append `text` for `player_id`, credit their response time and advance.
///
/// A submission from anyone but the current player is a no-op returning `None`.
pub fn submit(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    player_id: &str,
    text: &str,
) -> Result<Outcome<Option<StorySegment>>, TransitionError> {
    if session.status != SessionStatus::Playing
        || session.current_player_id.as_deref() != Some(player_id)
    {
        return Ok(Outcome::NoOp(None));
    }
    let Some(clock) = session.turn else {
        return Ok(Outcome::NoOp(None));
    };

    validate_submission(text, clock.word_limit, ctx.rules.max_submission_chars)?;

    let mut next = session.clone();
    let previous = next.story.last().map(|segment| segment.text.as_str());
    let normalized = normalize_segment(previous, text);
    let player = next
        .players
        .get_mut(player_id)
        .ok_or_else(|| TransitionError::PlayerNotFound(player_id.to_string()))?;
    let response_time = ledger::record_response(player, &clock, ctx.now);
    let color = player.color.clone();

    let segment = StorySegment {
        id: ctx.new_id(),
        text: normalized,
        author: SegmentAuthor::Player(player_id.to_string()),
        color,
        timestamp: ctx.now,
        metadata: SegmentMetadata {
            response_time: Some(response_time),
        },
    };
    next.story.push(segment.clone());
    next.last_player_id = Some(player_id.to_string());
    advance_turn(&mut next, ctx)?;

    Ok(commit(next, ctx, Some(segment)))
}

fn validate_submission(text: &str, word_limit: u8, max_chars: usize) -> Result<(), TransitionError> {
    let trimmed = text.trim();
    if trimmed.chars().count() > max_chars {
        return Err(TransitionError::InvalidInput(format!(
            "submission must not exceed {max_chars} characters"
        )));
    }
    let words = count_words(trimmed);
    if words == 0 {
        return Err(TransitionError::InvalidInput(
            "submission must contain at least one word".into(),
        ));
    }
    if words > usize::from(word_limit) {
        return Err(TransitionError::InvalidInput(format!(
            "submission has {words} words but the limit is {word_limit}"
        )));
    }
    Ok(())
}

/// Turn a skip targets; unset fields match any turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipExpectation {
    /// Player expected to hold the turn.
    pub player_id: Option<PlayerId>,
    /// Expected countdown anchor of that turn.
    pub started_at: Option<u64>,
}

impl SkipExpectation {
    fn matches(&self, current: &str, clock: &TurnClock) -> bool {
        self.player_id.as_deref().is_none_or(|id| id == current)
            && self.started_at.is_none_or(|at| at == clock.started_at)
    }
}

/// Skip the running turn, charging the full countdown to its holder.
///
/// Returns the skipped player, or `None` when the targeted turn already moved on.
pub fn skip(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    expected: &SkipExpectation,
) -> Result<Outcome<Option<PlayerId>>, TransitionError> {
    if session.status != SessionStatus::Playing {
        return Ok(Outcome::NoOp(None));
    }
    let (Some(current), Some(clock)) = (session.current_player_id.clone(), session.turn) else {
        return Ok(Outcome::NoOp(None));
    };
    if !expected.matches(&current, &clock) {
        return Ok(Outcome::NoOp(None));
    }

    let mut next = session.clone();
    if let Some(player) = next.players.get_mut(&current) {
        ledger::record_penalty(player, &clock);
    }
    next.last_player_id = Some(current.clone());
    advance_turn(&mut next, ctx)?;

    Ok(commit(next, ctx, Some(current)))
}

/// Host pause; the interrupted player gets the turn back on resume.
pub fn pause(session: &Session, ctx: &mut TransitionContext<'_>) -> Result<Outcome<()>, TransitionError> {
    if session.status == SessionStatus::Paused {
        return Ok(Outcome::NoOp(()));
    }

    let mut next = session.clone();
    if let Some(current) = next.current_player_id.clone() {
        next.turn_bag.retain(|id| id != &current);
        next.turn_bag.insert(0, current);
    }
    halt_turn(&mut next, SessionEvent::Pause(PauseReason::Manual))?;

    Ok(commit(next, ctx, ()))
}

/// Resume a paused session with a fresh turn.
pub fn resume(session: &Session, ctx: &mut TransitionContext<'_>) -> Result<Outcome<()>, TransitionError> {
    let status = session.status.next(SessionEvent::Resume)?;
    let active = session.active_count();
    if active < MIN_ACTIVE_PLAYERS {
        return Err(TransitionError::NotEnoughPlayers { active });
    }

    let mut next = session.clone();
    next.status = status;
    advance_turn(&mut next, ctx)?;

    Ok(commit(next, ctx, ()))
}

/// End the session for good.
pub fn end(session: &Session, ctx: &mut TransitionContext<'_>) -> Result<Outcome<()>, TransitionError> {
    if session.status == SessionStatus::Ended {
        return Ok(Outcome::NoOp(()));
    }

    let mut next = session.clone();
    halt_turn(&mut next, SessionEvent::End)?;
    next.turn_bag.clear();

    Ok(commit(next, ctx, ()))
}

/// Replace the text of a segment; the host becomes its author.
pub fn edit_segment(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    segment_id: &str,
    text: &str,
) -> Result<Outcome<StorySegment>, TransitionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TransitionError::InvalidInput(
            "segment text must not be empty".into(),
        ));
    }
    if text.chars().count() > ctx.rules.max_submission_chars {
        return Err(TransitionError::InvalidInput(format!(
            "segment text must not exceed {} characters",
            ctx.rules.max_submission_chars
        )));
    }

    let mut next = session.clone();
    let segment = next
        .story
        .iter_mut()
        .find(|segment| segment.id == segment_id)
        .ok_or_else(|| TransitionError::SegmentNotFound(segment_id.to_string()))?;
    if segment.text == text && segment.author == SegmentAuthor::Host {
        return Ok(Outcome::NoOp(segment.clone()));
    }
    segment.text = text.to_string();
    segment.author = SegmentAuthor::Host;
    let edited = segment.clone();

    Ok(commit(next, ctx, edited))
}

/// Remove a segment; returns whether it existed.
pub fn delete_segment(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    segment_id: &str,
) -> Result<Outcome<bool>, TransitionError> {
    let Some(position) = session.story.iter().position(|segment| segment.id == segment_id) else {
        return Ok(Outcome::NoOp(false));
    };

    let mut next = session.clone();
    next.story.remove(position);

    Ok(commit(next, ctx, true))
}

/// Replace the settings; the running turn keeps the limits it started with.
pub fn update_settings(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    settings: Settings,
) -> Result<Outcome<Settings>, TransitionError> {
    settings.check().map_err(TransitionError::InvalidInput)?;
    if session.settings == settings {
        return Ok(Outcome::NoOp(settings));
    }

    let mut next = session.clone();
    next.settings = settings;

    Ok(commit(next, ctx, settings))
}

/// Join parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Display name.
    pub name: String,
    /// Identifier from a previous join, to rejoin with the same stats and color.
    pub player_id: Option<PlayerId>,
}

/// Identity granted by a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedPlayer {
    /// Identifier to use for later calls.
    pub player_id: PlayerId,
    /// Assigned color.
    pub color: String,
    /// Whether an existing player was reactivated.
    pub rejoined: bool,
}

/// Add a player, or reactivate a known one.
pub fn join(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    request: &JoinRequest,
) -> Result<Outcome<JoinedPlayer>, TransitionError> {
    if session.status == SessionStatus::Ended {
        return Err(TransitionError::SessionEnded);
    }
    let name = request.name.trim();
    if name.is_empty() || name.chars().count() > MAX_PLAYER_NAME_CHARS {
        return Err(TransitionError::InvalidInput(format!(
            "player name must be between 1 and {MAX_PLAYER_NAME_CHARS} characters"
        )));
    }

    let requested = request.player_id.as_deref().map(str::trim);
    if let Some(id) = requested {
        check_player_id(id).map_err(TransitionError::InvalidInput)?;
    }

    let max = ctx.rules.max_players;
    let mut next = session.clone();
    let known = requested.filter(|id| next.players.contains_key(*id));

    let joined = if let Some(player_id) = known {
        let was_active = next.players[player_id].is_active;
        if !was_active && next.active_count() >= max {
            return Err(TransitionError::RoomFull { max });
        }
        let player = next
            .players
            .get_mut(player_id)
            .ok_or_else(|| TransitionError::PlayerNotFound(player_id.to_string()))?;
        player.name = name.to_string();
        player.is_active = true;
        player.last_seen = ctx.now;
        let joined = JoinedPlayer {
            player_id: player_id.to_string(),
            color: player.color.clone(),
            rejoined: true,
        };
        if !was_active && next.status == SessionStatus::Playing {
            let current = next.current_player_id.clone();
            scheduler::insert_late_joiner(
                &mut next.turn_bag,
                player_id,
                current.as_deref(),
                &mut ctx.rng,
            );
        }
        joined
    } else {
        if next.active_count() >= max {
            return Err(TransitionError::RoomFull { max });
        }
        let player_id = requested.map_or_else(|| ctx.new_id(), str::to_string);
        if next.players.contains_key(&player_id) {
            return Err(TransitionError::InvalidInput(format!(
                "player id `{player_id}` is already taken"
            )));
        }
        let color = ctx.rules.assign_color(&next);
        let player = Player {
            id: player_id.clone(),
            name: name.to_string(),
            color: color.clone(),
            is_active: true,
            last_seen: ctx.now,
            total_response_time: ledger::late_joiner_seed(&next),
            turn_count: 0,
            last_turn_time: None,
        };
        next.players.insert(player_id.clone(), player);
        if next.status == SessionStatus::Playing {
            let current = next.current_player_id.clone();
            scheduler::insert_late_joiner(
                &mut next.turn_bag,
                &player_id,
                current.as_deref(),
                &mut ctx.rng,
            );
        }
        JoinedPlayer {
            player_id,
            color,
            rejoined: false,
        }
    };

    Ok(commit(next, ctx, joined))
}

/// Deactivate a player, moving the turn along or pausing as needed.
///
/// Also serves as the disconnect hook; leaving twice is a no-op.
pub fn leave(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    player_id: &str,
) -> Result<Outcome<()>, TransitionError> {
    let player = session
        .players
        .get(player_id)
        .ok_or_else(|| TransitionError::PlayerNotFound(player_id.to_string()))?;
    if !player.is_active {
        return Ok(Outcome::NoOp(()));
    }

    let mut next = session.clone();
    if let Some(player) = next.players.get_mut(player_id) {
        player.is_active = false;
    }
    next.turn_bag.retain(|id| id != player_id);

    if !enforce_quorum(&mut next)? && next.current_player_id.as_deref() == Some(player_id) {
        advance_turn(&mut next, ctx)?;
    }

    Ok(commit(next, ctx, ()))
}

/// Deactivate every player; a playing session pauses.
pub fn clear_players(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
) -> Result<Outcome<usize>, TransitionError> {
    let active = session.active_count();
    if active == 0 && session.turn_bag.is_empty() {
        return Ok(Outcome::NoOp(0));
    }

    let mut next = session.clone();
    for player in next.players.values_mut() {
        player.is_active = false;
    }
    next.turn_bag.clear();
    enforce_quorum(&mut next)?;

    Ok(commit(next, ctx, active))
}

/// Refresh `last_seen`; activity flags are left alone and the write is not published.
pub fn heartbeat(
    session: &Session,
    ctx: &mut TransitionContext<'_>,
    player_id: &str,
) -> Result<Outcome<()>, TransitionError> {
    if !session.players.contains_key(player_id) {
        return Err(TransitionError::PlayerNotFound(player_id.to_string()));
    }

    let mut next = session.clone();
    if let Some(player) = next.players.get_mut(player_id) {
        player.last_seen = ctx.now;
    }

    Ok(match commit(next, ctx, ()) {
        Outcome::Commit(next, ()) => Outcome::Quiet(next, ()),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> SessionRules {
        SessionRules::default()
    }

    fn apply<T>(outcome: Result<Outcome<T>, TransitionError>) -> (Session, T) {
        match outcome.unwrap() {
            Outcome::Commit(session, value) | Outcome::Quiet(session, value) => {
                session.check_invariants().unwrap();
                (session, value)
            }
            Outcome::NoOp(_) => panic!("expected a commit"),
        }
    }

    fn lobby() -> Session {
        Session::new("ABC234".into(), "host-secret".into(), Settings::default(), 0)
    }

    fn with_players(names: &[&str]) -> Session {
        let rules = rules();
        let mut session = lobby();
        for (index, name) in names.iter().enumerate() {
            let mut ctx = TransitionContext::seeded(10, &rules, index as u64);
            let request = JoinRequest {
                name: name.to_string(),
                player_id: Some(name.to_lowercase()),
            };
            (session, _) = apply(join(&session, &mut ctx, &request));
        }
        session
    }

    fn playing(names: &[&str]) -> Session {
        let rules = rules();
        let session = with_players(names);
        let mut ctx = TransitionContext::seeded(1_000, &rules, 42);
        apply(start(&session, &mut ctx)).0
    }

    #[test]
    fn colors_follow_the_palette_then_cycle() {
        let rules = SessionRules {
            palette: vec!["#111111".into(), "#222222".into()],
            ..SessionRules::default()
        };
        let mut session = lobby();
        let mut colors = Vec::new();
        for (index, name) in ["a", "b", "c"].iter().enumerate() {
            let mut ctx = TransitionContext::seeded(0, &rules, index as u64);
            let request = JoinRequest {
                name: name.to_string(),
                player_id: None,
            };
            let joined;
            (session, joined) = apply(join(&session, &mut ctx, &request));
            colors.push(joined.color);
        }
        assert_eq!(colors, vec!["#111111", "#222222", "#111111"]);
    }

    #[test]
    fn padded_rejoin_keeps_the_existing_player() {
        let rules = rules();
        let mut session = with_players(&["Alice", "Bob", "Carol"]);
        if let Some(alice) = session.players.get_mut("alice") {
            alice.turn_count = 3;
            alice.total_response_time = 7_000;
        }
        let color = session.players["alice"].color.clone();

        let mut ctx = TransitionContext::seeded(50, &rules, 9);
        let request = JoinRequest {
            name: "Alicia".into(),
            player_id: Some("alice ".into()),
        };
        let (session, joined) = apply(join(&session, &mut ctx, &request));

        assert!(joined.rejoined);
        assert_eq!(joined.player_id, "alice");
        assert_eq!(joined.color, color);
        assert_eq!(session.players.len(), 3);
        let alice = &session.players["alice"];
        assert_eq!(alice.name, "Alicia");
        assert_eq!(alice.turn_count, 3);
        assert_eq!(alice.total_response_time, 7_000);
    }

    #[test]
    fn reserved_and_blank_player_ids_are_refused() {
        let rules = rules();
        let session = lobby();
        let long = "x".repeat(65);
        for id in ["HOST", " host ", "   ", long.as_str()] {
            let mut ctx = TransitionContext::seeded(0, &rules, 1);
            let request = JoinRequest {
                name: "Mallory".into(),
                player_id: Some(id.to_string()),
            };
            assert!(
                matches!(join(&session, &mut ctx, &request), Err(TransitionError::InvalidInput(_))),
                "{id:?} should be refused"
            );
        }
    }

    #[test]
    fn player_authored_segments_keep_their_author_when_stored() {
        let rules = rules();
        let mut session = playing(&["Alice", "Bob"]);
        let current = session.current_player_id.clone().unwrap();
        let mut ctx = TransitionContext::seeded(2_000, &rules, 5);
        (session, _) = apply(submit(&session, &mut ctx, &current, "hello"));

        let stored = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&stored).unwrap();
        assert_eq!(back.story[0].author, SegmentAuthor::Player(current));
    }

    #[test]
    fn start_requires_two_active_players() {
        let rules = rules();
        let session = with_players(&["Alice"]);
        let mut ctx = TransitionContext::seeded(0, &rules, 1);
        assert_eq!(
            start(&session, &mut ctx).unwrap_err(),
            TransitionError::NotEnoughPlayers { active: 1 }
        );
    }

    #[test]
    fn start_schedules_everyone_once() {
        let session = playing(&["Alice", "Bob", "Carol"]);
        assert_eq!(session.status, SessionStatus::Playing);
        assert_eq!(session.turn.unwrap().started_at, 1_000);
        let mut scheduled = session.turn_bag.clone();
        scheduled.push(session.current_player_id.clone().unwrap());
        scheduled.sort();
        assert_eq!(scheduled, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn start_twice_is_rejected() {
        let rules = rules();
        let session = playing(&["Alice", "Bob"]);
        let mut ctx = TransitionContext::seeded(0, &rules, 1);
        assert!(matches!(
            start(&session, &mut ctx),
            Err(TransitionError::InvalidTransition(_))
        ));
    }

    #[test]
    fn abc234_scenario() {
        let rules = rules();
        let mut session = with_players(&["Alice", "Bob", "Carol"]);
        session.settings.word_limit = 1;
        let mut ctx = TransitionContext::seeded(1_000, &rules, 7);
        (session, _) = apply(start(&session, &mut ctx));
        session.current_player_id = Some("alice".into());
        session.turn_bag = vec!["bob".into(), "carol".into()];

        let mut ctx = TransitionContext::seeded(3_000, &rules, 8);
        let segment;
        (session, segment) = apply(submit(&session, &mut ctx, "alice", "once"));
        assert_eq!(segment.unwrap().text, "Once");
        assert_eq!(session.current_player_id.as_deref(), Some("bob"));
        assert_eq!(session.players["alice"].total_response_time, 2_000);

        let mut ctx = TransitionContext::seeded(4_000, &rules, 9);
        (session, _) = apply(submit(&session, &mut ctx, "bob", "Upon"));
        let texts: Vec<&str> = session.story.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Once", "upon"]);
        assert_eq!(session.current_player_id.as_deref(), Some("carol"));

        let before = session.players["carol"].clone();
        let mut ctx = TransitionContext::seeded(34_000, &rules, 10);
        let skipped;
        (session, skipped) = apply(skip(&session, &mut ctx, &SkipExpectation::default()));
        assert_eq!(skipped.as_deref(), Some("carol"));
        let carol = &session.players["carol"];
        assert_eq!(carol.total_response_time, before.total_response_time + 30_000);
        assert_eq!(carol.turn_count, before.turn_count + 1);
        assert_eq!(session.story.len(), 2);
        assert_ne!(session.current_player_id.as_deref(), Some("carol"));
    }

    #[test]
    fn stale_submission_is_a_no_op() {
        let rules = rules();
        let session = playing(&["Alice", "Bob", "Carol"]);
        let current = session.current_player_id.clone().unwrap();

        let mut ctx = TransitionContext::seeded(5_000, &rules, 3);
        let (skipped, _) = apply(skip(&session, &mut ctx, &SkipExpectation::default()));

        let mut ctx = TransitionContext::seeded(5_001, &rules, 4);
        let outcome = submit(&skipped, &mut ctx, &current, "late").unwrap();
        assert_eq!(outcome, Outcome::NoOp(None));
    }

    #[test]
    fn redundant_expiry_skip_is_a_no_op() {
        let rules = rules();
        let session = playing(&["Alice", "Bob", "Carol"]);
        let expected = SkipExpectation {
            player_id: session.current_player_id.clone(),
            started_at: session.turn.map(|clock| clock.started_at),
        };

        let mut ctx = TransitionContext::seeded(31_000, &rules, 3);
        let (after, _) = apply(skip(&session, &mut ctx, &expected));

        let mut ctx = TransitionContext::seeded(31_050, &rules, 4);
        assert_eq!(skip(&after, &mut ctx, &expected).unwrap(), Outcome::NoOp(None));
    }

    #[test]
    fn submission_word_limit_uses_turn_snapshot() {
        let rules = rules();
        let session = playing(&["Alice", "Bob"]);
        let current = session.current_player_id.clone().unwrap();

        let mut ctx = TransitionContext::seeded(2_000, &rules, 1);
        let (session, _) = apply(update_settings(
            &session,
            &mut ctx,
            Settings {
                word_limit: 1,
                turn_time_limit: 30,
            },
        ));
        assert_eq!(session.turn.unwrap().word_limit, 3);

        let mut ctx = TransitionContext::seeded(2_500, &rules, 2);
        let (session, _) = apply(submit(&session, &mut ctx, &current, "three small words"));
        assert_eq!(session.turn.unwrap().word_limit, 1);

        let next = session.current_player_id.clone().unwrap();
        let mut ctx = TransitionContext::seeded(3_000, &rules, 3);
        assert!(matches!(
            submit(&session, &mut ctx, &next, "two words"),
            Err(TransitionError::InvalidInput(_))
        ));
        assert!(matches!(
            submit(&session, &mut ctx, &next, " ... "),
            Err(TransitionError::InvalidInput(_))
        ));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let rules = rules();
        let session = lobby();
        let mut ctx = TransitionContext::seeded(0, &rules, 1);
        let result = update_settings(
            &session,
            &mut ctx,
            Settings {
                word_limit: 9,
                turn_time_limit: 30,
            },
        );
        assert!(matches!(result, Err(TransitionError::InvalidInput(_))));
    }

    #[test]
    fn late_joiner_is_seeded_and_queued() {
        let rules = rules();
        let mut session = playing(&["Alice", "Bob"]);
        session.players["alice"].total_response_time = 4_000;
        session.players["bob"].total_response_time = 12_000;

        let mut ctx = TransitionContext::seeded(9_000, &rules, 11);
        let request = JoinRequest {
            name: "Dave".into(),
            player_id: None,
        };
        let (session, joined) = apply(join(&session, &mut ctx, &request));

        let dave = &session.players[&joined.player_id];
        assert_eq!(dave.total_response_time, 12_000);
        assert_eq!(dave.turn_count, 0);
        assert!(session.turn_bag.contains(&joined.player_id));
    }

    #[test]
    fn rejoin_keeps_color_and_stats() {
        let rules = rules();
        let mut session = playing(&["Alice", "Bob", "Carol"]);
        session.players["carol"].total_response_time = 7_000;
        session.players["carol"].turn_count = 2;
        let color = session.players["carol"].color.clone();

        let mut ctx = TransitionContext::seeded(2_000, &rules, 1);
        let (session, _) = apply(leave(&session, &mut ctx, "carol"));
        assert!(!session.turn_bag.contains(&"carol".to_string()));

        let mut ctx = TransitionContext::seeded(3_000, &rules, 2);
        let request = JoinRequest {
            name: "Caro".into(),
            player_id: Some("carol".into()),
        };
        let (session, joined) = apply(join(&session, &mut ctx, &request));
        assert!(joined.rejoined);
        assert_eq!(joined.color, color);
        let carol = &session.players["carol"];
        assert_eq!(carol.name, "Caro");
        assert_eq!(carol.total_response_time, 7_000);
        assert_eq!(carol.turn_count, 2);
        assert!(carol.is_active);
    }

    #[test]
    fn room_capacity_counts_active_players() {
        let rules = SessionRules {
            max_players: 2,
            ..SessionRules::default()
        };
        let session = with_players(&["Alice", "Bob"]);
        let mut ctx = TransitionContext::seeded(0, &rules, 1);
        let request = JoinRequest {
            name: "Carol".into(),
            player_id: None,
        };
        assert_eq!(
            join(&session, &mut ctx, &request).unwrap_err(),
            TransitionError::RoomFull { max: 2 }
        );

        let (session, _) = apply(leave(&session, &mut ctx, "bob"));
        assert!(join(&session, &mut ctx, &request).is_ok());
    }

    #[test]
    fn long_names_are_rejected() {
        let rules = rules();
        let mut ctx = TransitionContext::seeded(0, &rules, 1);
        let request = JoinRequest {
            name: "Bartholomew the Third".into(),
            player_id: None,
        };
        assert!(matches!(
            join(&lobby(), &mut ctx, &request),
            Err(TransitionError::InvalidInput(_))
        ));
    }

    #[test]
    fn losing_quorum_pauses_automatically() {
        let rules = rules();
        let session = playing(&["Alice", "Bob"]);
        let mut ctx = TransitionContext::seeded(5_000, &rules, 1);
        let (session, _) = apply(leave(&session, &mut ctx, "bob"));
        assert_eq!(session.status, SessionStatus::Paused);
        assert_eq!(session.current_player_id, None);
        assert_eq!(session.turn, None);

        let mut ctx = TransitionContext::seeded(6_000, &rules, 2);
        assert_eq!(
            resume(&session, &mut ctx).unwrap_err(),
            TransitionError::NotEnoughPlayers { active: 1 }
        );
    }

    #[test]
    fn leaving_current_player_passes_the_turn_without_stats() {
        let rules = rules();
        let session = playing(&["Alice", "Bob", "Carol"]);
        let current = session.current_player_id.clone().unwrap();

        let mut ctx = TransitionContext::seeded(5_000, &rules, 1);
        let (session, _) = apply(leave(&session, &mut ctx, &current));
        assert_eq!(session.status, SessionStatus::Playing);
        assert_ne!(session.current_player_id.as_deref(), Some(current.as_str()));
        assert_eq!(session.players[&current].turn_count, 0);
        assert_eq!(session.turn.unwrap().started_at, 5_000);
    }

    #[test]
    fn pause_and_resume_return_the_turn_to_the_interrupted_player() {
        let rules = rules();
        let session = playing(&["Alice", "Bob", "Carol"]);
        let current = session.current_player_id.clone().unwrap();

        let mut ctx = TransitionContext::seeded(2_000, &rules, 1);
        let (paused, _) = apply(pause(&session, &mut ctx));
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(pause(&paused, &mut ctx).unwrap(), Outcome::NoOp(()));

        let mut ctx = TransitionContext::seeded(9_000, &rules, 2);
        let (resumed, _) = apply(resume(&paused, &mut ctx));
        assert_eq!(resumed.current_player_id, Some(current));
        assert_eq!(resumed.turn.unwrap().started_at, 9_000);
    }

    #[test]
    fn lobby_cannot_pause_or_end() {
        let rules = rules();
        let mut ctx = TransitionContext::seeded(0, &rules, 1);
        assert!(pause(&lobby(), &mut ctx).is_err());
        assert!(end(&lobby(), &mut ctx).is_err());
    }

    #[test]
    fn end_is_terminal() {
        let rules = rules();
        let session = playing(&["Alice", "Bob"]);
        let mut ctx = TransitionContext::seeded(2_000, &rules, 1);
        let (ended, _) = apply(end(&session, &mut ctx));
        assert_eq!(ended.status, SessionStatus::Ended);
        assert_eq!(end(&ended, &mut ctx).unwrap(), Outcome::NoOp(()));
        assert!(resume(&ended, &mut ctx).is_err());
        let request = JoinRequest {
            name: "Late".into(),
            player_id: None,
        };
        assert_eq!(
            join(&ended, &mut ctx, &request).unwrap_err(),
            TransitionError::SessionEnded
        );
    }

    #[test]
    fn host_edits_and_deletes_segments() {
        let rules = rules();
        let session = playing(&["Alice", "Bob"]);
        let current = session.current_player_id.clone().unwrap();
        let mut ctx = TransitionContext::seeded(2_000, &rules, 1);
        let (session, segment) = apply(submit(&session, &mut ctx, &current, "dragons"));
        let segment = segment.unwrap();

        let (edited, updated) = apply(edit_segment(&session, &mut ctx, &segment.id, " wyverns "));
        assert_eq!(updated.text, "wyverns");
        assert_eq!(updated.author, SegmentAuthor::Host);
        assert_eq!(updated.color, segment.color);

        assert!(matches!(
            edit_segment(&edited, &mut ctx, "missing", "x"),
            Err(TransitionError::SegmentNotFound(_))
        ));

        let (deleted, existed) = apply(delete_segment(&edited, &mut ctx, &segment.id));
        assert!(existed);
        assert!(deleted.story.is_empty());
        assert_eq!(
            delete_segment(&deleted, &mut ctx, &segment.id).unwrap(),
            Outcome::NoOp(false)
        );
    }

    #[test]
    fn clear_players_pauses_and_empties_the_bag() {
        let rules = rules();
        let session = playing(&["Alice", "Bob", "Carol"]);
        let mut ctx = TransitionContext::seeded(2_000, &rules, 1);
        let (cleared, count) = apply(clear_players(&session, &mut ctx));
        assert_eq!(count, 3);
        assert_eq!(cleared.status, SessionStatus::Paused);
        assert_eq!(cleared.active_count(), 0);
        assert!(cleared.turn_bag.is_empty());
        assert_eq!(clear_players(&cleared, &mut ctx).unwrap(), Outcome::NoOp(0));
    }

    #[test]
    fn heartbeat_never_reactivates() {
        let rules = rules();
        let session = with_players(&["Alice", "Bob"]);
        let mut ctx = TransitionContext::seeded(50, &rules, 1);
        let (session, _) = apply(leave(&session, &mut ctx, "bob"));
        let mut ctx = TransitionContext::seeded(900, &rules, 2);
        let (session, _) = apply(heartbeat(&session, &mut ctx, "bob"));
        assert_eq!(session.players["bob"].last_seen, 900);
        assert!(!session.players["bob"].is_active);
        assert!(matches!(
            heartbeat(&session, &mut ctx, "nobody"),
            Err(TransitionError::PlayerNotFound(_))
        ));
    }

    #[test]
    fn host_token_is_checked() {
        let session = lobby();
        assert!(ensure_host(&session, "host-secret").is_ok());
        assert_eq!(
            ensure_host(&session, "guess").unwrap_err(),
            TransitionError::Unauthorized
        );
    }
}
