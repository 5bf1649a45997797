//! Six-face cube map loading.
//!
//! All six faces are fetched concurrently. The load succeeds only if every
//! face downloads, decodes, is square and matches the other faces' size.

use std::fmt;

use futures::future::try_join_all;
use thiserror::Error;
use tracing::debug;

use crate::pipeline::{fetch_image, DecodedImage};
use crate::provider::{AsyncHttpClient, ProviderError};
use crate::proxy::Proxy;

/// A face of the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeMapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeMapFace {
    /// Faces in load order.
    pub const ALL: [CubeMapFace; 6] = [
        CubeMapFace::PositiveX,
        CubeMapFace::NegativeX,
        CubeMapFace::PositiveY,
        CubeMapFace::NegativeY,
        CubeMapFace::PositiveZ,
        CubeMapFace::NegativeZ,
    ];
}

impl fmt::Display for CubeMapFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CubeMapFace::PositiveX => "positiveX",
            CubeMapFace::NegativeX => "negativeX",
            CubeMapFace::PositiveY => "positiveY",
            CubeMapFace::NegativeY => "negativeY",
            CubeMapFace::PositiveZ => "positiveZ",
            CubeMapFace::NegativeZ => "negativeZ",
        };
        f.write_str(name)
    }
}

/// Errors from [`load_cube_map`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CubeMapError {
    /// A face could not be fetched or decoded.
    #[error("Failed to load cube map face {face}: {source}")]
    Face {
        face: CubeMapFace,
        #[source]
        source: ProviderError,
    },

    /// A face is not square or differs in size from the first face.
    #[error("Cube map face {face} is {width}x{height}, expected {expected}x{expected}")]
    FaceSize {
        face: CubeMapFace,
        width: u32,
        height: u32,
        expected: u32,
    },
}

/// URLs of the six faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeMapSources {
    pub positive_x: String,
    pub negative_x: String,
    pub positive_y: String,
    pub negative_y: String,
    pub positive_z: String,
    pub negative_z: String,
}

impl CubeMapSources {
    pub fn url(&self, face: CubeMapFace) -> &str {
        match face {
            CubeMapFace::PositiveX => &self.positive_x,
            CubeMapFace::NegativeX => &self.negative_x,
            CubeMapFace::PositiveY => &self.positive_y,
            CubeMapFace::NegativeY => &self.negative_y,
            CubeMapFace::PositiveZ => &self.positive_z,
            CubeMapFace::NegativeZ => &self.negative_z,
        }
    }
}

/// Decoded faces of a cube map. Every face is `size` × `size`.
#[derive(Debug, Clone)]
pub struct CubeMapImages {
    pub positive_x: DecodedImage,
    pub negative_x: DecodedImage,
    pub positive_y: DecodedImage,
    pub negative_y: DecodedImage,
    pub positive_z: DecodedImage,
    pub negative_z: DecodedImage,
}

impl CubeMapImages {
    pub fn face(&self, face: CubeMapFace) -> &DecodedImage {
        match face {
            CubeMapFace::PositiveX => &self.positive_x,
            CubeMapFace::NegativeX => &self.negative_x,
            CubeMapFace::PositiveY => &self.positive_y,
            CubeMapFace::NegativeY => &self.negative_y,
            CubeMapFace::PositiveZ => &self.positive_z,
            CubeMapFace::NegativeZ => &self.negative_z,
        }
    }

    /// Edge length of each face in pixels.
    pub fn size(&self) -> u32 {
        self.positive_x.width()
    }
}

/// Loads all six faces of a cube map.
///
/// Fails on the first face that cannot be loaded; no partial result is
/// returned.
pub async fn load_cube_map<C: AsyncHttpClient>(
    client: &C,
    sources: &CubeMapSources,
    proxy: Option<&dyn Proxy>,
) -> Result<CubeMapImages, CubeMapError> {
    let requests = CubeMapFace::ALL.map(|face| {
        let url = match proxy {
            Some(proxy) => proxy.get_url(sources.url(face)),
            None => sources.url(face).to_string(),
        };
        async move {
            debug!(face = %face, url = %url, "Loading cube map face");
            fetch_image(client, &url)
                .await
                .map_err(|source| CubeMapError::Face { face, source })
        }
    });

    let faces = try_join_all(requests).await?;
    let expected = faces[0].width();
    for (face, image) in CubeMapFace::ALL.iter().zip(&faces) {
        if image.width() != expected || image.height() != expected {
            return Err(CubeMapError::FaceSize {
                face: *face,
                width: image.width(),
                height: image.height(),
                expected,
            });
        }
    }

    let faces: [DecodedImage; 6] = faces.try_into().map_err(|_| CubeMapError::Face {
        face: CubeMapFace::PositiveX,
        source: ProviderError::InvalidResponse("expected six cube map faces".to_string()),
    })?;
    let [positive_x, negative_x, positive_y, negative_y, positive_z, negative_z] = faces;

    Ok(CubeMapImages {
        positive_x,
        negative_x,
        positive_y,
        negative_y,
        positive_z,
        negative_z,
    })
}
