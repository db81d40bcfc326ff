//! Check GStreamer and the elements sources rely on.

use gstframe_source::gst_backend::element_available;

/// (element, needed for)
const ELEMENTS: &[(&str, &str)] = &[
    ("appsink", "every source"),
    ("videotestsrc", "test pipelines"),
    ("videoconvert", "raw gst_nvcamera"),
    ("jpegenc", "JPEG test pipelines"),
    ("nvcamerasrc", "gst_nvcamera"),
    ("nvvidconv", "gst_nvcamera"),
    ("nvjpegenc", "JPEG gst_nvcamera"),
];

pub fn run() -> anyhow::Result<()> {
    println!("gstframe System Check");
    println!("{}", "=".repeat(50));

    gstframe_source::init()?;
    println!("[OK] GStreamer initialized");

    let mut appsink_ok = false;
    for (element, purpose) in ELEMENTS {
        let available = element_available(element)?;
        if *element == "appsink" {
            appsink_ok = available;
        }
        let tag = if available { "OK" } else { "MISSING" };
        println!("[{tag}] {element:<14} ({purpose})");
    }

    println!();
    if appsink_ok {
        println!("appsink is available. gstframe is ready.");
    } else {
        println!("appsink is missing; install gst-plugins-base.");
    }

    Ok(())
}
