//! `/v1/files` uploads.

use std::io::{self, Read};
use std::path::Path;

use crate::client::{parse_json, LexofficeClient};
use crate::error::Result;
use crate::error_response::{ErrorSchema, Resource};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::multipart::MultipartForm;
use crate::transport::Transport;
use crate::types::FileReference;

const SCHEMA: ErrorSchema = Resource::Files.error_schema();

/// Upload type for bookkeeping vouchers.
pub const FILE_TYPE_VOUCHER: &str = "voucher";

impl<T: Transport> LexofficeClient<T> {
    pub fn build_upload_file(&self, name: &str, contents: &[u8]) -> HttpRequest {
        let form = MultipartForm::new();
        let content_type = form.content_type();
        let body = form
            .file("file", name, contents)
            .text("type", FILE_TYPE_VOUCHER)
            .finish();
        self.request(HttpMethod::Post, "/v1/files/", Some(body), &content_type)
    }

    pub fn parse_upload_file(&self, response: HttpResponse) -> Result<FileReference> {
        parse_json(&response, SCHEMA)
    }

    /// Upload everything `reader` yields as a voucher named `name`.
    pub fn upload_file<R: Read>(&self, mut reader: R, name: &str) -> Result<FileReference> {
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents)?;
        let response = self.dispatch(&self.build_upload_file(name, &contents), SCHEMA)?;
        self.parse_upload_file(response)
    }

    pub fn upload_file_path(&self, path: impl AsRef<Path>) -> Result<FileReference> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "upload path has no file name"))?;
        let file = std::fs::File::open(path)?;
        self.upload_file(file, &name)
    }
}
