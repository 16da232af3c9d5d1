//! Music library commands

use serde::Serialize;
use serde_json::{json, Value};

use cadenza_protocol::MediaType;

use crate::client::{command_args, CadenzaClient};
use crate::error::ClientError;

/// Paging and filtering for the library listing commands.
///
/// Unset fields are omitted from the wire, leaving the server defaults in
/// effect.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryQuery {
    pub in_library: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Option<String>,
}

impl CadenzaClient {
    /// Free-text search across the library and providers. Results are
    /// passed through undecoded, grouped by media type.
    pub async fn search(
        &self,
        search_query: &str,
        media_types: Option<&[MediaType]>,
        limit: Option<u32>,
    ) -> Result<Value, ClientError> {
        self.invoke(
            "music/search",
            command_args(json!({
                "search_query": search_query,
                "media_types": media_types,
                "limit": limit,
            })),
        )
        .await
    }

    pub async fn get_library_tracks(&self, query: &LibraryQuery) -> Result<Value, ClientError> {
        self.list_library("music/tracks", query).await
    }

    pub async fn get_library_artists(&self, query: &LibraryQuery) -> Result<Value, ClientError> {
        self.list_library("music/artists", query).await
    }

    pub async fn get_library_albums(&self, query: &LibraryQuery) -> Result<Value, ClientError> {
        self.list_library("music/albums", query).await
    }

    pub async fn get_library_playlists(&self, query: &LibraryQuery) -> Result<Value, ClientError> {
        self.list_library("music/playlists", query).await
    }

    pub async fn get_library_radios(&self, query: &LibraryQuery) -> Result<Value, ClientError> {
        self.list_library("music/radios", query).await
    }

    async fn list_library(
        &self,
        command: &str,
        query: &LibraryQuery,
    ) -> Result<Value, ClientError> {
        self.invoke(command, command_args(serde_json::to_value(query)?))
            .await
    }

    /// Fetch one track, from the library or directly from a provider.
    pub async fn get_track(
        &self,
        item_id: &str,
        provider_instance_id_or_domain: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.invoke(
            "music/track",
            command_args(json!({
                "item_id": item_id,
                "provider_instance_id_or_domain": provider_instance_id_or_domain,
            })),
        )
        .await
    }

    pub async fn get_artist(
        &self,
        item_id: &str,
        provider_instance_id_or_domain: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.invoke(
            "music/artist",
            command_args(json!({
                "item_id": item_id,
                "provider_instance_id_or_domain": provider_instance_id_or_domain,
            })),
        )
        .await
    }

    pub async fn get_album(
        &self,
        item_id: &str,
        provider_instance_id_or_domain: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.invoke(
            "music/album",
            command_args(json!({
                "item_id": item_id,
                "provider_instance_id_or_domain": provider_instance_id_or_domain,
            })),
        )
        .await
    }

    pub async fn get_album_tracks(
        &self,
        item_id: &str,
        provider_instance_id_or_domain: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.invoke(
            "music/album/tracks",
            command_args(json!({
                "item_id": item_id,
                "provider_instance_id_or_domain": provider_instance_id_or_domain,
            })),
        )
        .await
    }

    pub async fn get_playlist_tracks(
        &self,
        item_id: &str,
        provider_instance_id_or_domain: Option<&str>,
    ) -> Result<Value, ClientError> {
        self.invoke(
            "music/playlist/tracks",
            command_args(json!({
                "item_id": item_id,
                "provider_instance_id_or_domain": provider_instance_id_or_domain,
            })),
        )
        .await
    }

    /// Mark an item as part of the library. Fire-and-forget; the server
    /// confirms through a library event.
    pub fn add_to_library(
        &self,
        media_type: MediaType,
        item_id: &str,
        provider_instance_id_or_domain: Option<&str>,
    ) -> Result<(), ClientError> {
        self.send(
            "music/library/add",
            command_args(json!({
                "media_type": media_type,
                "item_id": item_id,
                "provider_instance_id_or_domain": provider_instance_id_or_domain,
            })),
        )
    }

    pub fn remove_from_library(
        &self,
        media_type: MediaType,
        item_id: &str,
        provider_instance_id_or_domain: Option<&str>,
    ) -> Result<(), ClientError> {
        self.send(
            "music/library/remove",
            command_args(json!({
                "media_type": media_type,
                "item_id": item_id,
                "provider_instance_id_or_domain": provider_instance_id_or_domain,
            })),
        )
    }

    /// Kick off a provider sync. Progress arrives through sync-task events.
    /// Omitted arguments mean all media types / all providers.
    pub fn start_sync(
        &self,
        media_types: Option<&[MediaType]>,
        providers: Option<&[String]>,
    ) -> Result<(), ClientError> {
        self.send(
            "music/sync",
            command_args(json!({
                "media_types": media_types,
                "providers": providers,
            })),
        )
    }
}
