//! HTML templates for the Mock IdP login page.

/// Escape HTML special characters to prevent XSS.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Values carried through the login form as hidden fields.
pub struct LoginPage<'a> {
    pub provider: &'a str,
    pub state: &'a str,
    pub nonce: &'a str,
    pub code_challenge: &'a str,
    pub redirect_uri: &'a str,
}

/// Generate the HTML login page.
pub fn login_page(page: &LoginPage<'_>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Mock Sign In: {provider} (DEV ONLY)</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, sans-serif;
            max-width: 400px;
            margin: 100px auto;
            padding: 20px;
        }}
        .warning {{
            background: #fff3cd;
            border: 1px solid #ffc107;
            padding: 15px;
            border-radius: 8px;
            margin-bottom: 20px;
        }}
        form {{
            background: #f8f9fa;
            padding: 20px;
            border-radius: 8px;
        }}
        label {{
            display: block;
            margin-bottom: 5px;
        }}
        input[type="email"], input[type="text"] {{
            width: 100%;
            padding: 10px;
            margin-bottom: 15px;
            box-sizing: border-box;
        }}
    </style>
</head>
<body>
    <div class="warning">
        <p>This is a <strong>mock login</strong> for development purposes.
        Any email address is accepted.</p>
    </div>

    <form action="/authorize/submit" method="POST">
        <input type="hidden" name="provider" value="{provider}" />
        <input type="hidden" name="state" value="{state}" />
        <input type="hidden" name="nonce" value="{nonce}" />
        <input type="hidden" name="code_challenge" value="{code_challenge}" />
        <input type="hidden" name="redirect_uri" value="{redirect_uri}" />

        <label for="email">Email Address</label>
        <input type="email" id="email" name="email" placeholder="dev@example.com" required />

        <label for="name">Name (optional)</label>
        <input type="text" id="name" name="name" placeholder="Dev User" />

        <button type="submit">Sign in</button>
    </form>
</body>
</html>"#,
        provider = html_escape(page.provider),
        state = html_escape(page.state),
        nonce = html_escape(page.nonce),
        code_challenge = html_escape(page.code_challenge),
        redirect_uri = html_escape(page.redirect_uri),
    )
}
