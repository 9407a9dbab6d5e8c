pub mod istanbul;
pub mod summary;

use crate::error::Result;

/// Every input document parser implements this trait.
pub trait Parser {
    type Output;

    /// Parse the input bytes into our in-memory model.
    fn parse(&self, input: &[u8]) -> Result<Self::Output>;
}

/// Return the leading bytes of `content` as text, for content sniffing.
pub(crate) fn sniff_head(content: &[u8]) -> String {
    let head_len = content.len().min(4096);
    String::from_utf8_lossy(&content[..head_len]).into_owned()
}
