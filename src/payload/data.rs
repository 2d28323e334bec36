use super::CheckType;

pub(super) struct StaticCategory {
    pub name: &'static str,
    pub check_type: CheckType,
    pub payloads: &'static [&'static str],
    pub false_payloads: &'static [&'static str],
}

pub(super) const BASE: &[StaticCategory] = &[
    StaticCategory {
        name: "SQL Injection",
        check_type: CheckType::ParamCheck,
        payloads: &[
            "' OR '1'='1",
            "' OR 1=1--",
            "1' AND SLEEP(5)--",
            "1 UNION SELECT NULL,NULL,NULL--",
            "admin'--",
            "'; DROP TABLE users--",
            "1' AND extractvalue(1,concat(0x7e,version()))--",
        ],
        false_payloads: &["O'Reilly", "select a plan", "union station", "1-1=0 math"],
    },
    StaticCategory {
        name: "XSS",
        check_type: CheckType::ParamCheck,
        payloads: &[
            "<script>alert(1)</script>",
            "<img src=x onerror=alert(1)>",
            "<svg onload=alert(1)>",
            "javascript:alert(document.cookie)",
            "\"><script>alert(1)</script>",
            "<iframe src=javascript:alert(1)>",
        ],
        false_payloads: &["<b>bold</b>", "a < b and c > d", "script writer", "on error resume"],
    },
    StaticCategory {
        name: "Path Traversal",
        check_type: CheckType::ParamCheck,
        payloads: &[
            "../../../../etc/passwd",
            "..\\..\\..\\windows\\win.ini",
            "/etc/passwd%00",
            "....//....//etc/passwd",
        ],
        false_payloads: &["docs/readme.txt", "2024/01/report", "a..b"],
    },
    StaticCategory {
        name: "Command Injection",
        check_type: CheckType::ParamCheck,
        payloads: &["; cat /etc/passwd", "| id", "`whoami`", "$(uname -a)", "&& ping -c 1 127.0.0.1"],
        false_payloads: &["rock & roll", "cats | dogs", "price $5"],
    },
    StaticCategory {
        name: "SSRF",
        check_type: CheckType::ParamCheck,
        payloads: &[
            "http://169.254.169.254/latest/meta-data/",
            "http://127.0.0.1:22",
            "file:///etc/passwd",
            "gopher://127.0.0.1:6379/_INFO",
        ],
        false_payloads: &["https://www.example.com/", "http://example.org/page"],
    },
    StaticCategory {
        name: "NoSQL Injection",
        check_type: CheckType::ParamCheck,
        payloads: &["{\"$gt\": \"\"}", "{\"$ne\": null}", "'; return true; var x='", "{\"$where\": \"sleep(1000)\"}"],
        false_payloads: &["{\"name\": \"alice\"}", "greater than"],
    },
    StaticCategory {
        name: "LFI",
        check_type: CheckType::FileCheck,
        payloads: &[
            "etc/passwd",
            ".env",
            ".git/config",
            "wp-config.php.bak",
            "../../../../etc/shadow",
            "server-status",
        ],
        false_payloads: &["index.html", "robots.txt", "favicon.ico"],
    },
    StaticCategory {
        name: "Header Injection",
        check_type: CheckType::Header,
        payloads: &[
            "X-Forwarded-For: 127.0.0.1' OR '1'='1",
            "User-Agent: <script>alert(1)</script>",
            "Referer: http://169.254.169.254/latest/meta-data/",
            "X-Original-URL: /admin\nX-Rewrite-URL: /admin",
            "Cookie: session=../../../../etc/passwd",
        ],
        false_payloads: &["X-Request-Id: 12345", "Accept-Language: en-US"],
    },
];

/// Vendor-targeted payloads merged in with `use_advanced_payloads`
pub(super) const ADVANCED: &[StaticCategory] = &[
    StaticCategory {
        name: "SQL Injection",
        check_type: CheckType::ParamCheck,
        payloads: &[
            "1'/*!50000UNION*/ /*!50000SELECT*/ 1,2--",
            "1' /*!OR*/ '1'='1",
            "1'%0aOR%0a'1'='1",
            "1' AnD 1=1-- -",
            "1' || 1#",
        ],
        false_payloads: &[],
    },
    StaticCategory {
        name: "XSS",
        check_type: CheckType::ParamCheck,
        payloads: &[
            "<svg/onload=alert`1`>",
            "<details open ontoggle=alert(1)>",
            "<a href=\"jav&#x09;ascript:alert(1)\">x</a>",
            "<img src=x oNeRrOr=confirm(1)>",
        ],
        false_payloads: &[],
    },
    StaticCategory {
        name: "Path Traversal",
        check_type: CheckType::ParamCheck,
        payloads: &["..%252f..%252f..%252fetc/passwd", "%2e%2e/%2e%2e/%2e%2e/etc/passwd", "..;/..;/etc/passwd"],
        false_payloads: &[],
    },
    StaticCategory {
        name: "Command Injection",
        check_type: CheckType::ParamCheck,
        payloads: &[";c'a't /etc/passwd", "|${IFS}id", "$(printf${IFS}id)"],
        false_payloads: &[],
    },
];
