//! Merge service: reconciles an elimination-marked measure into a single
//! layer, or reports that layers still conflict.
//!
//! Two implementations are provided: [`HttpMergeService`] talks to a remote
//! endpoint, [`LocalMergeService`] merges in-process.

mod http;
mod local;
mod wire;

use std::future::Future;

use crate::error::MergeServiceError;

pub use http::HttpMergeService;
pub use local::{merge_measure_layers, LocalMergeService};
pub use wire::{
    EncodedMei, MergeReply, MergeRequest, MergeResponse, RequestContent, ResolvedFlag,
    ResponseContent, BASE64_ENCODING,
};

/// The merge round trip. This is the only suspension point of a session.
pub trait MergeService {
    fn merge(
        &self,
        request: &MergeRequest,
    ) -> impl Future<Output = Result<MergeResponse, MergeServiceError>> + Send;
}

impl<T: MergeService> MergeService for &T {
    fn merge(
        &self,
        request: &MergeRequest,
    ) -> impl Future<Output = Result<MergeResponse, MergeServiceError>> + Send {
        (**self).merge(request)
    }
}
