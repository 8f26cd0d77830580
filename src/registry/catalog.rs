//! Built-in node catalog.
//!
//! Keys are lowercase dotted paths without array indices. Structural nodes describing list items
//! end with `.list`.

use super::node::{Conversion, Role, ValueType};

/// One catalog row: (path, description, role, type, conversion, writable).
pub(super) type CatalogRow = (
    &'static str,
    &'static str,
    Role,
    ValueType,
    Option<Conversion>,
    bool,
);

use Conversion::{CreateLink, CreateLinkOnly, DateTimestamp, MsMin, SecondsReadable};
use Role::{Button, Channel, Date, Indicator, Json, Level, State, Text, Url, Value};
use ValueType::{Boolean, Number, String};

/// Media types tracked by the timeline, in ascending display priority.
pub const MEDIA_TYPES: [&str; 3] = ["photo", "music", "video"];

pub(super) const NODES: &[CatalogRow] = &[
    // Session metadata published for the player currently playing something.
    ("playing", "Now playing", Channel, ValueType::Json, None, false),
    ("playing.metadata", "Metadata of the playing item", Channel, ValueType::Json, None, false),
    ("playing.metadata.title", "Title", Text, String, None, false),
    ("playing.metadata.type", "Item type", Text, String, None, false),
    ("playing.metadata.summary", "Summary", Text, String, None, false),
    ("playing.metadata.tagline", "Tagline", Text, String, None, false),
    ("playing.metadata.studio", "Studio", Text, String, None, false),
    ("playing.metadata.year", "Release year", Value, Number, None, false),
    ("playing.metadata.index", "Index within parent", Value, Number, None, false),
    ("playing.metadata.parentindex", "Parent index", Value, Number, None, false),
    ("playing.metadata.parenttitle", "Parent title", Text, String, None, false),
    ("playing.metadata.grandparenttitle", "Grandparent title", Text, String, None, false),
    ("playing.metadata.ratingkey", "Rating key", Text, String, None, false),
    ("playing.metadata.key", "Item key", Text, String, None, false),
    ("playing.metadata.librarysectiontitle", "Library section", Text, String, None, false),
    ("playing.metadata.contentrating", "Content rating", Text, String, None, false),
    ("playing.metadata.rating", "Rating", Value, Number, None, false),
    ("playing.metadata.duration", "Duration", Value, Number, Some(MsMin), false),
    ("playing.metadata.viewoffset", "Playback offset", Value, Number, Some(SecondsReadable), false),
    ("playing.metadata.addedat", "Added at", Date, Number, Some(DateTimestamp), false),
    ("playing.metadata.updatedat", "Updated at", Date, Number, Some(DateTimestamp), false),
    ("playing.metadata.lastviewedat", "Last viewed at", Date, Number, Some(DateTimestamp), false),
    ("playing.metadata.originallyavailableat", "Originally available at", Date, Number, Some(DateTimestamp), false),
    ("playing.metadata.thumb", "Thumbnail", Url, String, Some(CreateLink), false),
    ("playing.metadata.art", "Artwork", Url, String, Some(CreateLink), false),
    ("playing.metadata.parentthumb", "Parent thumbnail", Url, String, Some(CreateLink), false),
    ("playing.metadata.grandparentthumb", "Grandparent thumbnail", Url, String, Some(CreateLink), false),
    ("playing.metadata.genre", "Genres", Text, String, None, false),
    ("playing.metadata.director", "Directors", Text, String, None, false),
    ("playing.metadata.writer", "Writers", Text, String, None, false),
    ("playing.metadata.role", "Cast", Text, String, None, false),
    ("playing.metadata.country", "Countries", Text, String, None, false),
    ("playing.metadata.media", "Media", Channel, ValueType::Json, None, false),
    ("playing.metadata.media.list", "Media entry", Channel, ValueType::Json, None, false),
    ("playing.metadata.media.bitrate", "Bitrate", Value, Number, None, false),
    ("playing.metadata.media.duration", "Media duration", Value, Number, Some(MsMin), false),
    ("playing.metadata.media.container", "Container", Text, String, None, false),
    ("playing.metadata.media.videocodec", "Video codec", Text, String, None, false),
    ("playing.metadata.media.audiocodec", "Audio codec", Text, String, None, false),
    ("playing.metadata.media.videoresolution", "Video resolution", Text, String, None, false),
    ("playing.metadata.media.audiochannels", "Audio channels", Value, Number, None, false),
    ("playing.metadata.media.part", "Media parts", Channel, ValueType::Json, None, false),
    ("playing.metadata.media.part.list", "Media part", Channel, ValueType::Json, None, false),
    ("playing.metadata.media.part.file", "File", Text, String, None, false),
    ("playing.metadata.media.part.size", "File size", Value, Number, None, false),
    ("playing.metadata.media.part.key", "Part stream link", Url, String, Some(CreateLinkOnly), false),
    ("playing.metadata.media.part.stream", "Streams", Channel, ValueType::Json, None, false),
    ("playing.metadata.media.part.stream.list", "Stream", Channel, ValueType::Json, None, false),
    ("playing.metadata.media.part.stream.codec", "Codec", Text, String, None, false),
    ("playing.metadata.media.part.stream.streamtype", "Stream type", Value, Number, None, false),
    ("playing.metadata.media.part.stream.language", "Language", Text, String, None, false),
    ("playing.metadata.media.part.stream.displaytitle", "Display title", Text, String, None, false),
    ("playing.metadata.media.part.stream.bitrate", "Stream bitrate", Value, Number, None, false),
    ("playing.metadata.media.part.stream.key", "Stream link", Url, String, Some(CreateLinkOnly), false),
    ("playing.metadata.player.title", "Player name", Text, String, None, false),
    ("playing.metadata.player.state", "Player state", Text, String, None, false),
    ("playing.metadata.player.product", "Player product", Text, String, None, false),
    ("playing.metadata.player.platform", "Player platform", Text, String, None, false),
    ("playing.metadata.player.local", "Player is local", Indicator, Boolean, None, false),
    ("playing.metadata.session.bandwidth", "Session bandwidth", Value, Number, None, false),
    ("playing.metadata.session.location", "Session location", Text, String, None, false),
    ("playing.metadata.user.title", "User", Text, String, None, false),
    ("playing.lyrics", "Lyrics", Channel, ValueType::Json, None, false),
    ("playing.lyrics.url", "Lyrics link", Url, String, Some(CreateLinkOnly), false),
    // Webhook notifications.
    ("events", "Notifications", Channel, ValueType::Json, None, false),
    ("events.event", "Event", Text, String, None, false),
    ("events.user", "Event from owner account", Indicator, Boolean, None, false),
    ("events.owner", "Event from server owner", Indicator, Boolean, None, false),
    ("events.account.title", "Account", Text, String, None, false),
    ("events.server.title", "Server", Text, String, None, false),
    ("events.player.title", "Player", Text, String, None, false),
    ("events.player.publicaddress", "Player public address", Text, String, None, false),
    ("events.message", "Last notification message", Text, String, None, false),
    ("events.caption", "Last notification caption", Text, String, None, false),
    ("events.thumbnail", "Last notification thumbnail", Url, String, None, false),
    ("events.history", "Notification history", Json, String, None, false),
    // Player identity and capabilities.
    ("player", "Player", Channel, ValueType::Json, None, false),
    ("player.name", "Name", Text, String, None, false),
    ("player.address", "Address", Text, String, None, false),
    ("player.port", "Port", Value, Number, None, false),
    ("player.protocolcapabilities", "Protocol capabilities", Text, String, None, false),
    ("player.controllable", "Player can be controlled", Indicator, Boolean, None, false),
    ("player.connected", "Player is reachable", Indicator, Boolean, None, false),
    ("player.product", "Product", Text, String, None, false),
    ("player.platform", "Platform", Text, String, None, false),
    ("player.affordances", "Advertised playback controls", Text, String, None, false),
    // Timeline details.
    ("details", "Timeline", Channel, ValueType::Json, None, false),
    ("details.active", "Active stream", Channel, ValueType::Json, None, false),
    ("details.active.type", "Active media type", Text, String, None, false),
    ("details.active.state", "Active playback state", Text, String, None, false),
    ("details.active.time", "Active elapsed time", Value, Number, Some(SecondsReadable), false),
    ("details.active.duration", "Active duration", Value, Number, None, false),
    ("details.active.url", "Active media key", Text, String, None, false),
    // Playback controls.
    ("_controls", "Controls", Channel, ValueType::Json, None, false),
    ("_controls.playback", "Playback controls", Channel, ValueType::Json, None, false),
    ("_controls.playback.play", "Play", Button, Boolean, None, true),
    ("_controls.playback.pause", "Pause", Button, Boolean, None, true),
    ("_controls.playback.stop", "Stop", Button, Boolean, None, true),
    ("_controls.playback.skipnext", "Skip to next", Button, Boolean, None, true),
    ("_controls.playback.skipprevious", "Skip to previous", Button, Boolean, None, true),
    ("_controls.playback.stepforward", "Step forward", Button, Boolean, None, true),
    ("_controls.playback.stepback", "Step back", Button, Boolean, None, true),
    ("_controls.playback.playing", "Play / pause", State, Boolean, None, true),
    ("_controls.playback.seekto", "Seek to offset (ms)", Level, Number, None, true),
    ("_controls.playback.seek", "Seek position (%)", Level, Number, None, true),
    ("_controls.playback.volume", "Volume", Level, Number, None, true),
    ("_controls.playback.shuffle", "Shuffle", State, Boolean, None, true),
    ("_controls.playback.repeat", "Repeat mode", Value, Number, None, true),
    ("_controls.playback.viewoffset", "View offset", Value, Number, Some(SecondsReadable), false),
    ("_controls.navigation", "Navigation controls", Channel, ValueType::Json, None, false),
    ("_controls.navigation.moveup", "Move up", Button, Boolean, None, true),
    ("_controls.navigation.movedown", "Move down", Button, Boolean, None, true),
    ("_controls.navigation.moveleft", "Move left", Button, Boolean, None, true),
    ("_controls.navigation.moveright", "Move right", Button, Boolean, None, true),
    ("_controls.navigation.select", "Select", Button, Boolean, None, true),
    ("_controls.navigation.back", "Back", Button, Boolean, None, true),
    ("_controls.navigation.home", "Home", Button, Boolean, None, true),
];

/// Per-media-type timeline fields, instantiated for every entry of [`MEDIA_TYPES`].
pub(super) const DETAIL_FIELDS: &[(&str, &str, Role, ValueType, Option<Conversion>)] = &[
    ("state", "Playback state", Text, String, None),
    ("time", "Elapsed time", Value, Number, Some(SecondsReadable)),
    ("duration", "Duration", Value, Number, None),
    ("key", "Media key", Text, String, None),
    ("ratingkey", "Rating key", Text, String, None),
    ("volume", "Volume", Value, Number, None),
    ("shuffle", "Shuffle", Value, Number, None),
    ("repeat", "Repeat", Value, Number, None),
    ("controllable", "Advertised controls", Text, String, None),
    ("seekrange", "Seek range", Text, String, None),
    ("location", "Location", Text, String, None),
    ("playqueueid", "Play queue", Value, Number, None),
];
