//! Minimal PresentationML (`.pptx`) writer for picture-only decks.
//!
//! A deck is an OPC package: a ZIP archive of XML parts wired together by
//! relationship files. This writer emits exactly the parts PowerPoint,
//! Keynote and LibreOffice need to open a deck of full-bleed pictures:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! docProps/{core,app}.xml
//! ppt/presentation.xml            + _rels
//! ppt/slideMasters/slideMaster1.xml + _rels
//! ppt/slideLayouts/slideLayout1.xml + _rels   (blank layout)
//! ppt/theme/theme1.xml
//! ppt/slides/slideN.xml           + _rels
//! ppt/media/imageN.png
//! ```
//!
//! The whole package is built in memory and written in one step by
//! [`Presentation::save_atomic`], so an interrupted run never leaves a
//! half-written deck behind.

use crate::config::SlideSize;
use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const REL_OFFICE_DOC: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_APP: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const CT_PRESENTATION: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const CT_SLIDE_MASTER: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
const CT_SLIDE_LAYOUT: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";
const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const CT_THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
const CT_CORE: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const CT_APP: &str = "application/vnd.openxmlformats-officedocument.extended-properties+xml";

/// First `p:sldId` value; PowerPoint requires ids ≥ 256.
const FIRST_SLIDE_ID: u32 = 256;

/// Errors raised while building or writing a package.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml formatting failed")]
    Xml(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, PackageError>;

/// Position and size of a picture on the slide, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone)]
struct PictureSlide {
    png: Vec<u8>,
    placement: Placement,
    description: String,
}

/// An in-memory deck of picture slides.
#[derive(Debug, Clone)]
pub struct Presentation {
    title: String,
    size: SlideSize,
    slides: Vec<PictureSlide>,
}

impl Presentation {
    pub fn new(title: impl Into<String>, size: SlideSize) -> Self {
        Self {
            title: title.into(),
            size,
            slides: Vec::new(),
        }
    }

    /// Append a slide holding one PNG at `placement`.
    ///
    /// `description` becomes the picture's alt text.
    pub fn add_picture_slide(
        &mut self,
        png: Vec<u8>,
        placement: Placement,
        description: impl Into<String>,
    ) {
        self.slides.push(PictureSlide {
            png,
            placement,
            description: description.into(),
        });
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slide_size(&self) -> SlideSize {
        self.size
    }

    /// Serialise the package to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let xml = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // PNG data is already compressed.
        let media = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        put(&mut zip, "[Content_Types].xml", self.content_types_xml()?.as_bytes(), xml)?;
        put(&mut zip, "_rels/.rels", package_rels_xml()?.as_bytes(), xml)?;
        put(&mut zip, "docProps/core.xml", self.core_xml()?.as_bytes(), xml)?;
        put(&mut zip, "docProps/app.xml", self.app_xml()?.as_bytes(), xml)?;
        put(&mut zip, "ppt/presentation.xml", self.presentation_xml()?.as_bytes(), xml)?;
        put(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            self.presentation_rels_xml()?.as_bytes(),
            xml,
        )?;
        put(&mut zip, "ppt/slideMasters/slideMaster1.xml", slide_master_xml().as_bytes(), xml)?;
        put(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            slide_master_rels_xml()?.as_bytes(),
            xml,
        )?;
        put(&mut zip, "ppt/slideLayouts/slideLayout1.xml", slide_layout_xml().as_bytes(), xml)?;
        put(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            slide_layout_rels_xml()?.as_bytes(),
            xml,
        )?;
        put(&mut zip, "ppt/theme/theme1.xml", THEME_XML.as_bytes(), xml)?;

        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            put(
                &mut zip,
                &format!("ppt/slides/slide{n}.xml"),
                slide_xml(slide, n)?.as_bytes(),
                xml,
            )?;
            put(
                &mut zip,
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                slide_rels_xml(n)?.as_bytes(),
                xml,
            )?;
            put(&mut zip, &format!("ppt/media/image{n}.png"), &slide.png, media)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    /// Write the package to `path` via a temp file in the same directory and
    /// a rename, so readers never observe a partial file. Returns the byte size.
    pub fn save_atomic(&self, path: &Path) -> Result<u64> {
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| PackageError::Io(e.error))?;
        Ok(bytes.len() as u64)
    }

    // ── Parts ────────────────────────────────────────────────────────────

    fn content_types_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(1024 + self.slides.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        xml.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
        for (part, ct) in [
            ("/ppt/presentation.xml", CT_PRESENTATION),
            ("/ppt/slideMasters/slideMaster1.xml", CT_SLIDE_MASTER),
            ("/ppt/slideLayouts/slideLayout1.xml", CT_SLIDE_LAYOUT),
            ("/ppt/theme/theme1.xml", CT_THEME),
            ("/docProps/core.xml", CT_CORE),
            ("/docProps/app.xml", CT_APP),
        ] {
            write!(xml, r#"<Override PartName="{part}" ContentType="{ct}"/>"#)?;
        }
        for n in 1..=self.slides.len() {
            write!(
                xml,
                r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="{CT_SLIDE}"/>"#
            )?;
        }
        xml.push_str("</Types>");
        Ok(xml)
    }

    fn core_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(512);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
        write!(xml, "<dc:title>{}</dc:title>", escape_xml(&self.title))?;
        xml.push_str("<dc:creator>html2deck</dc:creator>");
        xml.push_str("</cp:coreProperties>");
        Ok(xml)
    }

    fn app_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(256);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">"#);
        xml.push_str("<Application>html2deck</Application>");
        write!(xml, "<Slides>{}</Slides>", self.slides.len())?;
        xml.push_str("</Properties>");
        Ok(xml)
    }

    /// Relationship ids: rId1 master, rId2 theme, rId3.. slides.
    fn presentation_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(1024 + self.slides.len() * 48);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(
            xml,
            r#"<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1">"#
        )?;
        xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
        if !self.slides.is_empty() {
            xml.push_str("<p:sldIdLst>");
            for i in 0..self.slides.len() {
                write!(
                    xml,
                    r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                    FIRST_SLIDE_ID + i as u32,
                    i + 3
                )?;
            }
            xml.push_str("</p:sldIdLst>");
        }
        write!(
            xml,
            r#"<p:sldSz cx="{}" cy="{}"/>"#,
            self.size.width_emu, self.size.height_emu
        )?;
        xml.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
        xml.push_str("</p:presentation>");
        Ok(xml)
    }

    fn presentation_rels_xml(&self) -> Result<String> {
        let mut rels = Relationships::default();
        rels.push(REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml");
        rels.push(REL_THEME, "theme/theme1.xml");
        for n in 1..=self.slides.len() {
            rels.push(REL_SLIDE, &format!("slides/slide{n}.xml"));
        }
        rels.to_xml()
    }
}

// ── Relationships ────────────────────────────────────────────────────────

/// Ordered relationship list; ids are assigned `rId1..` in push order.
#[derive(Default)]
struct Relationships {
    entries: Vec<(&'static str, String)>,
}

impl Relationships {
    fn push(&mut self, kind: &'static str, target: &str) {
        self.entries.push((kind, target.to_string()));
    }

    fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(256 + self.entries.len() * 160);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(xml, r#"<Relationships xmlns="{NS_PKG_REL}">"#)?;
        for (i, (kind, target)) in self.entries.iter().enumerate() {
            write!(
                xml,
                r#"<Relationship Id="rId{}" Type="{}" Target="{}"/>"#,
                i + 1,
                kind,
                escape_xml(target)
            )?;
        }
        xml.push_str("</Relationships>");
        Ok(xml)
    }
}

fn put(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    body: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options)?;
    zip.write_all(body)?;
    Ok(())
}

fn package_rels_xml() -> Result<String> {
    let mut rels = Relationships::default();
    rels.push(REL_OFFICE_DOC, "ppt/presentation.xml");
    rels.push(REL_CORE, "docProps/core.xml");
    rels.push(REL_APP, "docProps/app.xml");
    rels.to_xml()
}

fn slide_master_rels_xml() -> Result<String> {
    let mut rels = Relationships::default();
    rels.push(REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml");
    rels.push(REL_THEME, "../theme/theme1.xml");
    rels.to_xml()
}

fn slide_layout_rels_xml() -> Result<String> {
    let mut rels = Relationships::default();
    rels.push(REL_SLIDE_MASTER, "../slideMasters/slideMaster1.xml");
    rels.to_xml()
}

/// rId1 layout, rId2 picture.
fn slide_rels_xml(n: usize) -> Result<String> {
    let mut rels = Relationships::default();
    rels.push(REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml");
    rels.push(REL_IMAGE, &format!("../media/image{n}.png"));
    rels.to_xml()
}

// ── Slide parts ──────────────────────────────────────────────────────────

const EMPTY_GROUP: &str = concat!(
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
    r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#,
    r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
);

fn slide_master_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:sldMaster xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}">"#,
            r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>"#,
            r#"<p:spTree>{group}</p:spTree></p:cSld>"#,
            r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" "#,
            r#"accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" "#,
            r#"hlink="hlink" folHlink="folHlink"/>"#,
            r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#,
            r#"<p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles>"#,
            r#"</p:sldMaster>"#
        ),
        a = NS_A,
        r = NS_R,
        p = NS_P,
        group = EMPTY_GROUP
    )
}

fn slide_layout_xml() -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<p:sldLayout xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}" type="blank" preserve="1">"#,
            r#"<p:cSld name="Blank"><p:spTree>{group}</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#,
            r#"</p:sldLayout>"#
        ),
        a = NS_A,
        r = NS_R,
        p = NS_P,
        group = EMPTY_GROUP
    )
}

fn slide_xml(slide: &PictureSlide, n: usize) -> Result<String> {
    let Placement {
        x,
        y,
        width,
        height,
    } = slide.placement;

    let mut xml = String::with_capacity(1024);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    write!(
        xml,
        r#"<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#
    )?;
    xml.push_str("<p:cSld><p:spTree>");
    xml.push_str(EMPTY_GROUP);
    xml.push_str("<p:pic><p:nvPicPr>");
    write!(
        xml,
        r#"<p:cNvPr id="2" name="Picture {n}" descr="{}"/>"#,
        escape_xml(&slide.description)
    )?;
    xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#);
    xml.push_str(r#"<p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#);
    xml.push_str("<p:spPr><a:xfrm>");
    write!(xml, r#"<a:off x="{x}" y="{y}"/><a:ext cx="{width}" cy="{height}"/>"#)?;
    xml.push_str(r#"</a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#);
    xml.push_str("</p:pic></p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
    xml.push_str("</p:sld>");
    Ok(xml)
}

const THEME_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme">"#,
    r#"<a:themeElements>"#,
    r#"<a:clrScheme name="Office">"#,
    r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>"#,
    r#"<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#,
    r#"<a:dk2><a:srgbClr val="1F497D"/></a:dk2>"#,
    r#"<a:lt2><a:srgbClr val="EEECE1"/></a:lt2>"#,
    r#"<a:accent1><a:srgbClr val="4F81BD"/></a:accent1>"#,
    r#"<a:accent2><a:srgbClr val="C0504D"/></a:accent2>"#,
    r#"<a:accent3><a:srgbClr val="9BBB59"/></a:accent3>"#,
    r#"<a:accent4><a:srgbClr val="8064A2"/></a:accent4>"#,
    r#"<a:accent5><a:srgbClr val="4BACC6"/></a:accent5>"#,
    r#"<a:accent6><a:srgbClr val="F79646"/></a:accent6>"#,
    r#"<a:hlink><a:srgbClr val="0000FF"/></a:hlink>"#,
    r#"<a:folHlink><a:srgbClr val="800080"/></a:folHlink>"#,
    r#"</a:clrScheme>"#,
    r#"<a:fontScheme name="Office">"#,
    r#"<a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>"#,
    r#"<a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#,
    r#"</a:fontScheme>"#,
    r#"<a:fmtScheme name="Office">"#,
    r#"<a:fillStyleLst>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"</a:fillStyleLst>"#,
    r#"<a:lnStyleLst>"#,
    r#"<a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#,
    r#"<a:ln w="25400"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#,
    r#"<a:ln w="38100"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#,
    r#"</a:lnStyleLst>"#,
    r#"<a:effectStyleLst>"#,
    r#"<a:effectStyle><a:effectLst/></a:effectStyle>"#,
    r#"<a:effectStyle><a:effectLst/></a:effectStyle>"#,
    r#"<a:effectStyle><a:effectLst/></a:effectStyle>"#,
    r#"</a:effectStyleLst>"#,
    r#"<a:bgFillStyleLst>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#,
    r#"</a:bgFillStyleLst>"#,
    r#"</a:fmtScheme>"#,
    r#"</a:themeElements>"#,
    r#"<a:objectDefaults/><a:extraClrSchemeLst/>"#,
    r#"</a:theme>"#
);

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
