//! Audio response shaping: content type, attachment hints and body streams.

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    BoxError,
};
use futures::{stream, Stream};
use sonora_core::{AudioFormat, SynthesizedAudio};

/// Turn a fully buffered blob into a stream that yields it as one chunk.
pub fn one_shot(bytes: Vec<u8>) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    stream::once(async move { Ok(Bytes::from(bytes)) })
}

/// Chunked audio response with the format's MIME type.
pub fn audio_response<S, E>(
    format: AudioFormat,
    attachment: bool,
    extra_headers: HeaderMap,
    body: S,
) -> Response
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BoxError>,
{
    let mut headers = extra_headers;
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    if attachment {
        if let Ok(value) = HeaderValue::from_str(&format.attachment_disposition()) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    (StatusCode::OK, headers, Body::from_stream(body)).into_response()
}

/// Timing headers for batch synthesis results.
pub fn generation_stats_headers(audio: &SynthesizedAudio) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let stats = [
        ("x-generation-time-ms", format!("{:.1}", audio.generation_time_ms)),
        ("x-audio-duration-secs", format!("{:.2}", audio.duration_secs())),
        ("x-rtf", format!("{:.3}", audio.rtf())),
    ];
    for (name, value) in stats {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("X-Generation-Time-Ms, X-Audio-Duration-Secs, X-RTF"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn one_shot_yields_a_single_chunk() {
        let chunks: Vec<_> = one_shot(vec![1, 2, 3]).collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn attachment_hint_uses_extension() {
        let response = audio_response(AudioFormat::Wav, true, HeaderMap::new(), one_shot(vec![]));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=audio.wav"
        );

        let response = audio_response(AudioFormat::Pcm, false, HeaderMap::new(), one_shot(vec![]));
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }
}
