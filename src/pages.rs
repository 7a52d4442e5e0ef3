//! HTML pages.

use crate::gallery::ImageView;

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            padding: 20px;
        }
        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 800px;
            margin: 0 auto;
            padding: 40px;
        }
        h1 { color: #333; margin-bottom: 10px; font-size: 2em; }
        .subtitle { color: #666; margin-bottom: 30px; font-size: 0.9em; }
        .upload-area {
            border: 3px dashed #667eea;
            border-radius: 15px;
            padding: 30px 20px;
            text-align: center;
            background: #f8f9ff;
            margin-bottom: 30px;
        }
        .upload-area button {
            background: #667eea;
            color: white;
            border: none;
            border-radius: 20px;
            padding: 8px 20px;
            font-weight: 600;
            cursor: pointer;
            margin-left: 10px;
        }
        .images { list-style: none; }
        .images li { padding: 10px 0; border-bottom: 1px solid #e0e0e0; }
        .images a { color: #667eea; text-decoration: none; font-weight: 600; }
        .empty { color: #999; }
        .preview-image {
            max-width: 100%;
            border-radius: 10px;
            margin-bottom: 20px;
            box-shadow: 0 4px 15px rgba(0,0,0,0.1);
        }
        .result { background: #f8f9ff; border-radius: 10px; padding: 20px; margin-bottom: 20px; }
        .result-text { color: #333; font-size: 1.1em; line-height: 1.6; }
        .back { color: #667eea; font-weight: 600; }
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>
"#,
        title = html_escape(title),
        style = STYLE,
        body = body,
    )
}

/// Upload form plus a link for every stored object.
pub fn gallery(images: &[String]) -> String {
    let items = if images.is_empty() {
        r#"        <p class="empty">No images uploaded yet.</p>"#.to_string()
    } else {
        let entries: String = images
            .iter()
            .map(|name| {
                format!(
                    "            <li><a href=\"/view_image/{}\">{}</a></li>\n",
                    urlencoding::encode(name),
                    html_escape(name)
                )
            })
            .collect();
        format!("        <ul class=\"images\">\n{}        </ul>", entries)
    };

    let body = format!(
        r#"        <h1>Image Gallery</h1>
        <p class="subtitle">Upload an image and get an AI-generated title and description.</p>
        <form class="upload-area" method="post" action="/" enctype="multipart/form-data">
            <input type="file" name="image" accept="image/*" required>
            <button type="submit">Upload</button>
        </form>
{items}"#
    );

    layout("Image Gallery", &body)
}

/// Detail page for one image.
pub fn image_detail(view: &ImageView) -> String {
    let body = format!(
        r#"        <h1>{title}</h1>
        <img class="preview-image" src="{src}" alt="{title}">
        <div class="result">
            <p class="result-text">{description}</p>
        </div>
        <a class="back" href="/">Back to gallery</a>"#,
        title = html_escape(&view.title),
        src = html_escape(&view.image_url),
        description = html_escape(&view.description),
    );

    layout(&view.title, &body)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
